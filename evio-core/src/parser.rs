//! Low-level field extraction from EVIO 32-bit words.
//!
//! Record headers and block headers are plain arrays of words; the functions
//! here pick the individual fields out of them.

use crate::types::event_type;

// ============================================================================
// Record header
// Word 0: length of the record in words, exclusive of itself
// Word 1: [31:16] tag | [15:8] content type | [7:0] num
// ============================================================================

/// Index of the event number word in a CODA 2 physics record.
pub const EVENT_NUMBER_WORD: usize = 4;

/// Total record length in words, including the length word itself.
///
/// Computed in 64 bits so a length word of `u32::MAX` cannot wrap.
#[inline]
pub fn record_length(length_word: u32) -> u64 {
    u64::from(length_word) + 1
}

/// Extracts the 16-bit tag from the second record header word.
#[inline]
pub fn header_tag(word: u32) -> u16 {
    (word >> 16) as u16
}

// ============================================================================
// CODA 3 bank tags
// ============================================================================

/// CODA 3 top-level bank tags and the event types they map to.
pub const CODA3_BANK_TAGS: [(u16, u16); 6] = [
    (0xffd1, event_type::PRESTART),
    (0xffd2, event_type::GO),
    (0xffd4, event_type::END),
    (0xff50, event_type::PHYSICS),
    (0xff58, event_type::PHYSICS), // physics with sync bit
    (0xff70, event_type::PHYSICS),
];

/// Maps a CODA 3 bank tag to an event type.
#[inline]
pub fn coda3_event_type(bank_tag: u16) -> Option<u16> {
    CODA3_BANK_TAGS
        .iter()
        .find(|&&(tag, _)| tag == bank_tag)
        .map(|&(_, evtype)| evtype)
}

// ============================================================================
// Block header (EVIO versions 1-3)
// [0] block size | [1] block number | [2] header length | [3] first record
// [4] words used | [5] version + flags | [6] reserved | [7] magic
// ============================================================================

/// Number of words in a block header.
pub const BLOCK_HEADER_WORDS: usize = 8;

/// Magic number in the last word of every block header.
pub const BLOCK_MAGIC: u32 = 0xc0da_0100;

/// Last-block flag in the version word (EVIO version 3).
const LAST_BLOCK_BIT: u32 = 1 << 9;

pub const BLOCK_SIZE: usize = 0;
pub const BLOCK_NUMBER: usize = 1;
pub const BLOCK_HEADER_LENGTH: usize = 2;
pub const BLOCK_FIRST_RECORD: usize = 3;
pub const BLOCK_USED: usize = 4;
pub const BLOCK_VERSION: usize = 5;
pub const BLOCK_MAGIC_WORD: usize = 7;

/// Extracts the format version from a block header version word.
#[inline]
pub fn block_version(word: u32) -> u32 {
    word & 0xFF
}

/// Returns true if the block header version word carries the last-block flag.
#[inline]
pub fn block_is_last(word: u32) -> bool {
    word & LAST_BLOCK_BIT != 0
}
