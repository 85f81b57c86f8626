//! EVIO record classifier and file scan engine for CODA data.
//!
//! This crate reads EVIO version 2 and 3 files as written by the CODA data
//! acquisition system, classifies every record by its event type and
//! accumulates size and throughput statistics across one or more files.
//!
//! # Example
//!
//! ```no_run
//! use evio_core::{ScanConfig, Scanner};
//!
//! let mut scanner = Scanner::new(ScanConfig::default());
//! let summary = scanner.run_files(&["run_1234.dat"], &mut ()).unwrap();
//!
//! println!("{} records, {} physics", summary.records, summary.physics_records);
//! ```
//!
//! # Features
//!
//! - EVIO v2 event types and event numbers read from the record header
//! - CODA 3 bank tags mapped to CODA 2 event types, with synthesized event
//!   numbers that continue across files
//! - Big- and little-endian block files, records spanning blocks
//! - Pluggable record sources through the [`RecordSource`] trait

pub mod classifier;
pub mod parser;
pub mod reader;
pub mod scan;
pub mod source;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use classifier::{Classification, EventClassifier, FormatError};
pub use reader::{Endian, EvioFileReader, EvioReader};
pub use scan::{ScanConfig, ScanError, ScanFailure, ScanObserver, Scanner};
pub use source::{ReadStatus, RecordSource, SourceError};
pub use stats::{EventTypeCount, RunningStatistics, ScanSummary};
pub use types::{FormatVersion, RawRecord, MAX_RECORD_WORDS};
