//! Multi-file scan engine.
//!
//! Opens each input in turn, reads its records into a single reusable buffer,
//! classifies them and accumulates run-wide statistics. Any error other than
//! a clean end of stream aborts the whole run; the open source is closed on
//! every exit path.

use crate::classifier::{Classification, EventClassifier, FormatError};
use crate::reader::EvioFileReader;
use crate::source::{ReadStatus, RecordSource, SourceError};
use crate::stats::{RunningStatistics, ScanSummary};
use crate::types::{FormatVersion, RawRecord, MAX_RECORD_WORDS};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Default spacing of progress reports, in physics event numbers.
pub const DEFAULT_PROGRESS_INTERVAL: u32 = 25_000;

/// Errors that abort a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("This EVIO version is not supported: {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// A failed run, with the last known event number for context.
#[derive(Error, Debug)]
#[error("ERROR at event={last_event} ({}): {error}", .path.display())]
pub struct ScanFailure {
    /// Last physics event number seen before the failure
    pub last_event: u32,
    /// File being processed when the run failed
    pub path: PathBuf,
    #[source]
    pub error: ScanError,
}

/// Scan settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Record buffer capacity in 32-bit words
    pub buffer_words: usize,
    /// Report every physics event number divisible by this; 0 disables
    pub progress_interval: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            buffer_words: MAX_RECORD_WORDS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_words(mut self, words: usize) -> Self {
        self.buffer_words = words;
        self
    }

    pub fn with_progress_interval(mut self, interval: u32) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Callbacks for scan progress. All methods default to doing nothing.
pub trait ScanObserver {
    /// A file was opened and its version accepted.
    fn file_opened(&mut self, _path: &Path, _version: FormatVersion) {}

    /// A record was read and classified.
    fn record_read(&mut self, _record: &Classification) {}

    /// A physics event number hit the progress interval.
    fn progress(&mut self, _event_number: u32) {}

    /// A file reached its end of stream and was closed.
    fn file_finished(&mut self, _path: &Path, _records: u64) {}
}

impl ScanObserver for () {}

/// Closes the wrapped source when dropped, ignoring close errors.
struct OpenSource<S: RecordSource> {
    source: S,
    open: bool,
}

impl<S: RecordSource> OpenSource<S> {
    fn new(source: S) -> Self {
        Self { source, open: true }
    }

    fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.source.close() {
                warn!(error = %e, "failed to close record source");
            }
        }
    }
}

impl<S: RecordSource> Drop for OpenSource<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Drives record sources through the classifier into run statistics.
#[derive(Debug)]
pub struct Scanner {
    config: ScanConfig,
    buffer: RawRecord,
    classifier: EventClassifier,
    stats: RunningStatistics,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl Scanner {
    /// Creates a scanner and allocates its record buffer.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            buffer: RawRecord::with_capacity(config.buffer_words),
            config,
            classifier: EventClassifier::new(),
            stats: RunningStatistics::new(),
        }
    }

    /// Scans EVIO files on disk.
    pub fn run_files<P, O>(
        &mut self,
        paths: &[P],
        observer: &mut O,
    ) -> Result<ScanSummary, ScanFailure>
    where
        P: AsRef<Path>,
        O: ScanObserver + ?Sized,
    {
        self.run(paths, |path: &Path| EvioFileReader::open(path), observer)
    }

    /// Scans `paths` in order, opening each with `open`.
    ///
    /// Statistics and the event counter start fresh on every call. On failure
    /// nothing accumulated so far is returned.
    pub fn run<P, S, F, O>(
        &mut self,
        paths: &[P],
        mut open: F,
        observer: &mut O,
    ) -> Result<ScanSummary, ScanFailure>
    where
        P: AsRef<Path>,
        S: RecordSource,
        F: FnMut(&Path) -> Result<S, SourceError>,
        O: ScanObserver + ?Sized,
    {
        self.classifier.reset();
        self.stats = RunningStatistics::new();

        let start = Instant::now();
        for path in paths {
            let path = path.as_ref();
            if let Err(error) = self.scan_file(path, &mut open, observer) {
                return Err(ScanFailure {
                    last_event: self.classifier.last_event(),
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
        let elapsed = start.elapsed();

        Ok(self.stats.summarize(paths.len(), elapsed))
    }

    fn scan_file<S, F, O>(
        &mut self,
        path: &Path,
        open: &mut F,
        observer: &mut O,
    ) -> Result<(), ScanError>
    where
        S: RecordSource,
        F: FnMut(&Path) -> Result<S, SourceError>,
        O: ScanObserver + ?Sized,
    {
        let mut source = OpenSource::new(open(path)?);

        let raw_version = source.source.format_version()?;
        let version = FormatVersion::from_raw(raw_version)
            .ok_or(ScanError::UnsupportedVersion(raw_version))?;
        debug!(path = %path.display(), %version, "scanning file");
        observer.file_opened(path, version);

        let interval = self.config.progress_interval;
        let mut records = 0u64;
        while source.source.read_next(self.buffer.words_mut())? == ReadStatus::Record {
            let record = self.classifier.classify(self.buffer.words(), version)?;
            self.stats.record(&record);
            records += 1;
            observer.record_read(&record);

            if let Some(number) = record.event_number {
                if interval != 0 && number % interval == 0 {
                    observer.progress(number);
                }
            }
        }

        source.close();
        debug!(path = %path.display(), records, "end of file");
        observer.file_finished(path, records);
        Ok(())
    }
}
