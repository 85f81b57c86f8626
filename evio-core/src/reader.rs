//! EVIO block-file reader for format versions 1 to 3.
//!
//! An EVIO file is a sequence of fixed-size blocks, each starting with an
//! 8-word header. Records form one contiguous word stream across the used
//! part of the blocks and may span block boundaries. The byte order of the
//! file is detected from the magic number of the first block.

use crate::parser;
use crate::source::{ReadStatus, RecordSource, SourceError};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Upper bound on a block size accepted from a header, in words (64 MiB).
const MAX_BLOCK_WORDS: usize = 1 << 24;

const HEADER_BYTES: usize = parser::BLOCK_HEADER_WORDS * 4;

/// Byte order of an EVIO file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Detects the byte order from the raw bytes of a block header magic word.
    fn detect(magic: &[u8]) -> Option<Self> {
        if BigEndian::read_u32(magic) == parser::BLOCK_MAGIC {
            Some(Self::Big)
        } else if LittleEndian::read_u32(magic) == parser::BLOCK_MAGIC {
            Some(Self::Little)
        } else {
            None
        }
    }

    #[inline]
    fn read_words(self, src: &[u8], dst: &mut [u32]) {
        match self {
            Self::Big => BigEndian::read_u32_into(src, dst),
            Self::Little => LittleEndian::read_u32_into(src, dst),
        }
    }
}

/// EVIO reader over a file on disk.
pub type EvioFileReader = EvioReader<BufReader<File>>;

/// Sequential EVIO record reader.
#[derive(Debug)]
pub struct EvioReader<R> {
    inner: Option<R>,
    endian: Endian,
    version: u32,

    // Current block body (words after the 8 fixed header words)
    block: Vec<u32>,
    raw: Vec<u8>,
    pos: usize,
    end: usize,
    block_number: u32,
    last_block: bool,

    // Words of an oversize record still to be discarded
    pending_skip: u64,
}

impl EvioReader<BufReader<File>> {
    /// Opens an EVIO file and reads its first block header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened EVIO file");
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> EvioReader<R> {
    /// Wraps a byte stream positioned at the first block header.
    pub fn from_reader(mut inner: R) -> Result<Self, SourceError> {
        let mut raw_header = [0u8; HEADER_BYTES];
        match read_full(&mut inner, &mut raw_header)? {
            0 => return Err(SourceError::InvalidHandle("empty file".to_string())),
            n if n < HEADER_BYTES => {
                return Err(SourceError::InvalidHandle(format!(
                    "file too short for a block header ({n} bytes)"
                )))
            }
            _ => {}
        }

        let magic_offset = parser::BLOCK_MAGIC_WORD * 4;
        let endian = Endian::detect(&raw_header[magic_offset..magic_offset + 4]).ok_or_else(
            || SourceError::InvalidHandle("not an EVIO file (bad magic number)".to_string()),
        )?;

        let mut header = [0u32; parser::BLOCK_HEADER_WORDS];
        endian.read_words(&raw_header, &mut header);

        let mut reader = Self {
            inner: Some(inner),
            endian,
            version: parser::block_version(header[parser::BLOCK_VERSION]),
            block: Vec::new(),
            raw: Vec::new(),
            pos: 0,
            end: 0,
            block_number: header[parser::BLOCK_NUMBER],
            last_block: false,
            pending_skip: 0,
        };
        reader.load_block(&header)?;
        debug!(version = reader.version, endian = ?endian, "read first block header");
        Ok(reader)
    }

    /// Byte order detected from the first block.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Reads the body of the block whose header is `header`.
    fn load_block(&mut self, header: &[u32; parser::BLOCK_HEADER_WORDS]) -> Result<(), SourceError> {
        let number = header[parser::BLOCK_NUMBER];
        let invalid = |reason: String| SourceError::InvalidBlock {
            block: number,
            reason,
        };

        if header[parser::BLOCK_MAGIC_WORD] != parser::BLOCK_MAGIC {
            return Err(invalid(format!(
                "bad magic number {:#010x}",
                header[parser::BLOCK_MAGIC_WORD]
            )));
        }

        let size = header[parser::BLOCK_SIZE] as usize;
        let header_len = header[parser::BLOCK_HEADER_LENGTH] as usize;
        let used = header[parser::BLOCK_USED] as usize;
        let first_record = header[parser::BLOCK_FIRST_RECORD] as usize;

        if header_len < parser::BLOCK_HEADER_WORDS {
            return Err(invalid(format!("header length {header_len} too small")));
        }
        if size < header_len || size > MAX_BLOCK_WORDS {
            return Err(invalid(format!("block size {size} out of range")));
        }
        if used < header_len || used > size {
            return Err(invalid(format!(
                "used word count {used} inconsistent with block size {size}"
            )));
        }
        // Records run as one word stream across blocks, so reading never
        // seeks to this offset; it is only range-checked.
        if first_record > used {
            return Err(invalid(format!(
                "first record offset {first_record} beyond used words {used}"
            )));
        }

        let body_words = size - parser::BLOCK_HEADER_WORDS;
        self.raw.resize(body_words * 4, 0);
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        if read_full(inner, &mut self.raw)? < self.raw.len() {
            return Err(SourceError::TruncatedBlock { block: number });
        }
        self.block.resize(body_words, 0);
        self.endian.read_words(&self.raw, &mut self.block);

        self.pos = header_len - parser::BLOCK_HEADER_WORDS;
        self.end = used - parser::BLOCK_HEADER_WORDS;
        self.block_number = number;
        self.last_block = self.version >= 3 && parser::block_is_last(header[parser::BLOCK_VERSION]);
        Ok(())
    }

    /// Advances to the next block. Returns false at a clean end of file.
    fn next_block(&mut self) -> Result<bool, SourceError> {
        if self.last_block {
            return Ok(false);
        }

        let inner = self.inner.as_mut().ok_or_else(closed)?;
        let mut raw_header = [0u8; HEADER_BYTES];
        let expected = self.block_number.wrapping_add(1);
        match read_full(inner, &mut raw_header)? {
            0 => return Ok(false),
            n if n < HEADER_BYTES => {
                return Err(SourceError::TruncatedBlock { block: expected })
            }
            _ => {}
        }

        let mut header = [0u32; parser::BLOCK_HEADER_WORDS];
        self.endian.read_words(&raw_header, &mut header);
        if header[parser::BLOCK_NUMBER] != expected {
            warn!(
                expected,
                found = header[parser::BLOCK_NUMBER],
                "non-sequential EVIO block number"
            );
        }
        self.load_block(&header)?;
        Ok(true)
    }

    /// Makes at least one word available. Returns false at end of stream.
    #[inline]
    fn fill(&mut self) -> Result<bool, SourceError> {
        while self.pos == self.end {
            if !self.next_block()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Discards the tail of a previously truncated record.
    fn skip_pending(&mut self) -> Result<(), SourceError> {
        while self.pending_skip > 0 {
            if !self.fill()? {
                return Err(SourceError::UnexpectedEof);
            }
            let n = self.pending_skip.min((self.end - self.pos) as u64) as usize;
            self.pos += n;
            self.pending_skip -= n as u64;
        }
        Ok(())
    }
}

impl<R: Read> RecordSource for EvioReader<R> {
    fn format_version(&mut self) -> Result<u32, SourceError> {
        if self.inner.is_none() {
            return Err(closed());
        }
        Ok(self.version)
    }

    fn read_next(&mut self, buffer: &mut [u32]) -> Result<ReadStatus, SourceError> {
        self.skip_pending()?;
        if !self.fill()? {
            return Ok(ReadStatus::EndOfStream);
        }

        let mut remaining = parser::record_length(self.block[self.pos]);
        let mut copied = 0usize;
        while remaining > 0 {
            if copied == buffer.len() {
                // Record does not fit; the caller sees the full length word.
                self.pending_skip = remaining;
                break;
            }
            if !self.fill()? {
                return Err(SourceError::UnexpectedEof);
            }
            let available = self.end - self.pos;
            let n = remaining
                .min(available as u64)
                .min((buffer.len() - copied) as u64) as usize;
            buffer[copied..copied + n].copy_from_slice(&self.block[self.pos..self.pos + n]);
            copied += n;
            self.pos += n;
            remaining -= n as u64;
        }

        Ok(ReadStatus::Record)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.inner.take().is_some() {
            debug!(last_block = self.block_number, "closed EVIO source");
        }
        Ok(())
    }
}

fn closed() -> SourceError {
    SourceError::InvalidHandle("source is closed".to_string())
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    /// Lays `records` out in blocks of `block_words` words.
    fn encode(version: u32, records: &[Vec<u32>], block_words: usize, endian: Endian) -> Vec<u8> {
        let stream: Vec<u32> = records.iter().flatten().copied().collect();
        let payload = block_words - parser::BLOCK_HEADER_WORDS;
        let mut words = Vec::new();
        let mut number = 1;

        for chunk in stream.chunks(payload) {
            words.extend_from_slice(&[
                block_words as u32,
                number,
                8,
                8,
                (8 + chunk.len()) as u32,
                version,
                0,
                parser::BLOCK_MAGIC,
            ]);
            words.extend_from_slice(chunk);
            words.resize(words.len() + payload - chunk.len(), 0);
            number += 1;
        }
        if version >= 3 {
            words.extend_from_slice(&[8, number, 8, 0, 8, version | 0x200, 0, parser::BLOCK_MAGIC]);
        }

        let mut bytes = Vec::new();
        for w in words {
            match endian {
                Endian::Big => bytes.write_u32::<BigEndian>(w).unwrap(),
                Endian::Little => bytes.write_u32::<LittleEndian>(w).unwrap(),
            }
        }
        bytes
    }

    fn record(len: u32, fill: u32) -> Vec<u32> {
        let mut words = vec![fill; len as usize];
        words[0] = len - 1;
        words
    }

    fn read_all<R: Read>(reader: &mut EvioReader<R>, capacity: usize) -> Vec<Vec<u32>> {
        let mut buffer = vec![0u32; capacity];
        let mut out = Vec::new();
        while reader.read_next(&mut buffer).unwrap() == ReadStatus::Record {
            let len = (buffer[0] as usize + 1).min(capacity);
            out.push(buffer[..len].to_vec());
        }
        out
    }

    #[test]
    fn test_read_records_big_endian() {
        let records = vec![record(4, 0xaa), record(6, 0xbb), record(3, 0xcc)];
        let bytes = encode(2, &records, 64, Endian::Big);

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.endian(), Endian::Big);
        assert_eq!(reader.format_version().unwrap(), 2);
        assert_eq!(read_all(&mut reader, 32), records);
    }

    #[test]
    fn test_read_records_little_endian() {
        let records = vec![record(5, 1), record(2, 2)];
        let bytes = encode(3, &records, 64, Endian::Little);

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.endian(), Endian::Little);
        assert_eq!(reader.format_version().unwrap(), 3);
        assert_eq!(read_all(&mut reader, 32), records);
    }

    #[test]
    fn test_records_spanning_blocks() {
        // 12-word blocks leave 4 payload words, so most records span blocks.
        let records: Vec<_> = (0..10).map(|i| record(3 + i % 5, i)).collect();
        let bytes = encode(2, &records, 12, Endian::Big);

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(read_all(&mut reader, 32), records);
    }

    #[test]
    fn test_first_record_offset_does_not_move_reading() {
        let records: Vec<_> = (0..6).map(|i| record(3 + i % 3, i)).collect();
        let mut bytes = encode(2, &records, 12, Endian::Big);
        // Second block claims its first record starts at word 10.
        let word = (12 + parser::BLOCK_FIRST_RECORD) * 4;
        BigEndian::write_u32(&mut bytes[word..word + 4], 10);

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(read_all(&mut reader, 32), records);
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let bytes = encode(3, &[record(2, 0)], 16, Endian::Big);
        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        let mut buffer = [0u32; 8];

        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::Record);
        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::EndOfStream);
        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::EndOfStream);
    }

    #[test]
    fn test_oversize_record_is_truncated_and_skipped() {
        let records = vec![record(20, 7), record(3, 9)];
        let bytes = encode(2, &records, 16, Endian::Big);
        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        let mut buffer = [0u32; 8];

        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::Record);
        assert_eq!(buffer[0], 19);
        assert_eq!(buffer[7], 7);

        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::Record);
        assert_eq!(&buffer[..3], &[2, 9, 9]);
    }

    #[test]
    fn test_empty_file_is_invalid_handle() {
        let err = EvioReader::from_reader(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, SourceError::InvalidHandle(_)));
    }

    #[test]
    fn test_bad_magic_is_invalid_handle() {
        let mut bytes = encode(2, &[record(2, 0)], 16, Endian::Big);
        bytes[28..32].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let err = EvioReader::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SourceError::InvalidHandle(_)));
    }

    #[test]
    fn test_bad_magic_in_later_block() {
        let records: Vec<_> = (0..4).map(|i| record(6, i)).collect();
        let mut bytes = encode(2, &records, 16, Endian::Big);
        // Corrupt the magic word of the second block.
        bytes[64 + 28] = 0;

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        let mut buffer = [0u32; 32];
        let result = loop {
            match reader.read_next(&mut buffer) {
                Ok(ReadStatus::Record) => continue,
                other => break other,
            }
        };
        assert!(matches!(
            result,
            Err(SourceError::InvalidBlock { block: 2, .. })
        ));
    }

    #[test]
    fn test_truncated_block() {
        let records: Vec<_> = (0..4).map(|i| record(6, i)).collect();
        let mut bytes = encode(2, &records, 16, Endian::Big);
        bytes.truncate(64 + 40);

        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        let mut buffer = [0u32; 32];
        assert_eq!(reader.read_next(&mut buffer).unwrap(), ReadStatus::Record);
        assert!(matches!(
            reader.read_next(&mut buffer),
            Err(SourceError::TruncatedBlock { block: 2 })
        ));
    }

    #[test]
    fn test_eof_inside_record() {
        // Record claims 10 words but the file holds only 4 of them.
        let bytes = encode(2, &[vec![9, 1, 2, 3]], 16, Endian::Big);
        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        let mut buffer = [0u32; 32];
        assert!(matches!(
            reader.read_next(&mut buffer),
            Err(SourceError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_inconsistent_header() {
        let mut bytes = encode(2, &[record(2, 0)], 16, Endian::Big);
        // used (word 4) larger than block size
        bytes[16..20].copy_from_slice(&100u32.to_be_bytes());
        assert!(matches!(
            EvioReader::from_reader(Cursor::new(bytes)),
            Err(SourceError::InvalidBlock { block: 1, .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let bytes = encode(2, &[record(2, 0)], 16, Endian::Big);
        let mut reader = EvioReader::from_reader(Cursor::new(bytes)).unwrap();
        reader.close().unwrap();
        reader.close().unwrap();
        assert!(reader.format_version().is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = EvioFileReader::open("/nonexistent/run_1234.dat").unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
    }
}
