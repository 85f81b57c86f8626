//! Core types for EVIO record classification.
//!
//! This module defines the container format versions, the CODA event-type
//! codes, and the reusable record buffer that a scan reads into.

use std::fmt;

/// Capacity of the record buffer in 32-bit words (100 ki longwords, 400 KiB).
pub const MAX_RECORD_WORDS: usize = 102_400;

/// Event types up to and including this value are physics events.
pub const MAX_PHYSICS_EVENT_TYPE: u16 = 14;

/// CODA control and special event types (Hall A numbering).
pub mod event_type {
    /// Physics event type assigned to CODA 3 trigger banks.
    pub const PHYSICS: u16 = 1;
    pub const SYNC: u16 = 16;
    pub const PRESTART: u16 = 17;
    pub const GO: u16 = 18;
    pub const PAUSE: u16 = 19;
    pub const END: u16 = 20;
    pub const TS_PRESCALE: u16 = 120;
    pub const EPICS: u16 = 131;
    pub const PRESCALE: u16 = 133;
    pub const DETMAP_FILE: u16 = 135;
    pub const TRIGGER_FILE: u16 = 136;
    pub const SCALER: u16 = 140;
}

/// Returns true if `event_type` denotes a physics event.
#[inline]
pub fn is_physics(event_type: u16) -> bool {
    event_type <= MAX_PHYSICS_EVENT_TYPE
}

/// Returns a human-readable name for a known event type.
pub fn event_type_name(code: u16) -> Option<&'static str> {
    use event_type::*;

    match code {
        c if is_physics(c) => Some("PHYSICS"),
        SYNC => Some("SYNC"),
        PRESTART => Some("PRESTART"),
        GO => Some("GO"),
        PAUSE => Some("PAUSE"),
        END => Some("END"),
        TS_PRESCALE => Some("TS_PRESCALE"),
        EPICS => Some("EPICS"),
        PRESCALE => Some("PRESCALE"),
        DETMAP_FILE => Some("DETMAP_FILE"),
        TRIGGER_FILE => Some("TRIGGER_FILE"),
        SCALER => Some("SCALER"),
        _ => None,
    }
}

/// Supported EVIO container versions.
///
/// The version decides how the event type is extracted from the record
/// header: version 2 stores it directly, version 3 stores a CODA 3 bank tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    /// EVIO version 2 (CODA 2)
    V2,
    /// EVIO version 3 (CODA 3)
    V3,
}

impl FormatVersion {
    /// Maps a raw version number to a supported version.
    pub fn from_raw(version: u32) -> Option<Self> {
        match version {
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// Returns the raw version number.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// Fixed-capacity record buffer, reused for every read of a scan.
#[derive(Debug, Clone)]
pub struct RawRecord {
    words: Box<[u32]>,
}

impl RawRecord {
    /// Allocates a zeroed buffer of `capacity` words.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0u32; capacity].into_boxed_slice(),
        }
    }

    /// Capacity in 32-bit words.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        Self::with_capacity(MAX_RECORD_WORDS)
    }
}
