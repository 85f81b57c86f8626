//! Record classification.
//!
//! Turns the leading words of a raw record into its length, event type and,
//! for physics events, an event number. The classifier keeps the last known
//! event number for the whole run; CODA 3 records carry none, so it is
//! synthesized from a running counter that continues across files.

use crate::parser;
use crate::types::{self, FormatVersion};
use thiserror::Error;

/// Errors raised when a record does not conform to EVIO version 2 or 3.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Buffer overflow: record length {length} words exceeds buffer capacity {capacity}")]
    Overflow { length: u64, capacity: usize },

    #[error("Undefined CODA 3 event type (bank tag {tag:#06x})")]
    UndefinedBankTag { tag: u16 },

    #[error("Record of {length} words is too short for its header fields")]
    ShortRecord { length: u32 },
}

/// Result of classifying a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Record length in 32-bit words, including the length word
    pub length: u32,
    /// Event type in the CODA 2 numbering
    pub event_type: u16,
    /// Event number, present for physics events only
    pub event_number: Option<u32>,
}

impl Classification {
    /// Returns true if this is a physics record.
    #[inline]
    pub fn is_physics(&self) -> bool {
        types::is_physics(self.event_type)
    }

    /// Record length in bytes.
    #[inline]
    pub fn length_bytes(&self) -> u64 {
        4 * u64::from(self.length)
    }
}

/// Stateful record classifier.
#[derive(Debug, Default)]
pub struct EventClassifier {
    last_event: u32,
}

impl EventClassifier {
    /// Creates a classifier with the event counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known physics event number.
    pub fn last_event(&self) -> u32 {
        self.last_event
    }

    /// Resets the event counter for a new run.
    pub fn reset(&mut self) {
        self.last_event = 0;
    }

    /// Classifies the record at the start of `buffer`.
    ///
    /// `buffer` is the whole record buffer; its length is the capacity that
    /// the declared record length is checked against before anything else is
    /// decoded.
    pub fn classify(
        &mut self,
        buffer: &[u32],
        version: FormatVersion,
    ) -> Result<Classification, FormatError> {
        let capacity = buffer.len();
        let length = parser::record_length(buffer.first().copied().unwrap_or(0));
        if length > capacity as u64 {
            return Err(FormatError::Overflow { length, capacity });
        }
        // Bounded by capacity above.
        let length = length as u32;
        // Words past the record end hold data from an earlier read.
        if length < 2 {
            return Err(FormatError::ShortRecord { length });
        }

        let tag = parser::header_tag(buffer[1]);
        let event_type = match version {
            FormatVersion::V2 => tag,
            FormatVersion::V3 => parser::coda3_event_type(tag)
                .ok_or(FormatError::UndefinedBankTag { tag })?,
        };

        let event_number = if types::is_physics(event_type) {
            Some(self.next_event_number(buffer, length, version)?)
        } else {
            None
        };

        Ok(Classification {
            length,
            event_type,
            event_number,
        })
    }

    fn next_event_number(
        &mut self,
        buffer: &[u32],
        length: u32,
        version: FormatVersion,
    ) -> Result<u32, FormatError> {
        match version {
            FormatVersion::V2 => {
                if (length as usize) <= parser::EVENT_NUMBER_WORD {
                    return Err(FormatError::ShortRecord { length });
                }
                self.last_event = buffer[parser::EVENT_NUMBER_WORD];
            }
            FormatVersion::V3 => {
                self.last_event = self.last_event.wrapping_add(1);
            }
        }
        Ok(self.last_event)
    }
}
