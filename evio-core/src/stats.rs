//! Running statistics over a scan and the summary derived from them.

use crate::classifier::Classification;
use crate::types;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Counters accumulated over every record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningStatistics {
    /// Total number of records
    pub records: u64,
    /// Number of physics records
    pub physics_records: u64,
    /// Sum of record lengths in words
    pub total_words: u64,
    /// Shortest physics record in words, if any physics record was seen
    pub min_physics_words: Option<u32>,
    /// Longest physics record in words
    pub max_physics_words: u32,
    /// Longest record of any type in words
    pub max_words: u32,
    /// Record count per event type
    pub type_counts: BTreeMap<u16, u64>,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one classified record.
    pub fn record(&mut self, c: &Classification) {
        self.records += 1;
        self.total_words += u64::from(c.length);
        self.max_words = self.max_words.max(c.length);
        *self.type_counts.entry(c.event_type).or_insert(0) += 1;

        if c.is_physics() {
            self.physics_records += 1;
            self.max_physics_words = self.max_physics_words.max(c.length);
            self.min_physics_words = Some(match self.min_physics_words {
                Some(min) => min.min(c.length),
                None => c.length,
            });
        }
    }

    /// Total bytes read.
    pub fn total_bytes(&self) -> u64 {
        4 * self.total_words
    }

    /// Derives the end-of-run summary.
    pub fn summarize(&self, files: usize, elapsed: Duration) -> ScanSummary {
        let total_bytes = self.total_bytes();
        let total_mib = total_bytes as f64 / MIB;
        let wall_seconds = elapsed.as_secs_f64();

        let per_record = |value: f64| {
            if self.records == 0 {
                None
            } else {
                Some(value / self.records as f64)
            }
        };

        let event_types = self
            .type_counts
            .iter()
            .map(|(&code, &count)| EventTypeCount {
                code,
                name: types::event_type_name(code),
                count,
            })
            .collect();

        ScanSummary {
            files,
            records: self.records,
            physics_records: self.physics_records,
            total_bytes,
            total_mib,
            min_physics_bytes: self.min_physics_words.map(|w| 4 * u64::from(w)),
            max_physics_bytes: 4 * u64::from(self.max_physics_words),
            max_bytes: 4 * u64::from(self.max_words),
            average_bytes: per_record(total_bytes as f64),
            wall_seconds,
            us_per_event: per_record(1e6 * wall_seconds),
            mib_per_second: (wall_seconds > 0.0).then(|| total_mib / wall_seconds),
            event_types,
        }
    }
}

/// Record count of a single event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTypeCount {
    pub code: u16,
    pub name: Option<&'static str>,
    pub count: u64,
}

/// End-of-run report.
///
/// Ratios that would divide by zero are `None` and print as `n/a`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    pub files: usize,
    pub records: u64,
    pub physics_records: u64,
    pub total_bytes: u64,
    pub total_mib: f64,
    pub min_physics_bytes: Option<u64>,
    pub max_physics_bytes: u64,
    pub max_bytes: u64,
    /// Total bytes over all records, not only physics records
    pub average_bytes: Option<f64>,
    pub wall_seconds: f64,
    pub us_per_event: Option<f64>,
    pub mib_per_second: Option<f64>,
    pub event_types: Vec<EventTypeCount>,
}

struct OrNa<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OrNa<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str("n/a"),
        }
    }
}

/// Formats a float with four significant digits.
fn sig4(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let digits = 3 - value.abs().log10().floor() as i32;
    format!("{:.*}", digits.max(0) as usize, value)
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} file{} analyzed",
            self.files,
            if self.files > 1 { "s" } else { "" }
        )?;
        writeln!(f, "{} events", self.records)?;
        writeln!(f, "{} physics events", self.physics_records)?;
        writeln!(
            f,
            "{} bytes read ({:.3} MiB)",
            self.total_bytes, self.total_mib
        )?;
        writeln!(
            f,
            "{}/{}/{} bytes min_physics/max_physics/max event lengths",
            OrNa(self.min_physics_bytes),
            self.max_physics_bytes,
            self.max_bytes
        )?;
        writeln!(
            f,
            "{} bytes average record length",
            OrNa(self.average_bytes.map(sig4))
        )?;
        writeln!(f, "{:.6} seconds wall time", self.wall_seconds)?;
        writeln!(f, "{} µs/event", OrNa(self.us_per_event.map(sig4)))?;
        writeln!(
            f,
            "{} MiB/s throughput",
            OrNa(self.mib_per_second.map(sig4))
        )?;

        if !self.event_types.is_empty() {
            writeln!(f, "Event types:")?;
            for t in &self.event_types {
                writeln!(
                    f,
                    "  {:>5} {:<13} {}",
                    t.code,
                    t.name.unwrap_or("?"),
                    t.count
                )?;
            }
        }
        Ok(())
    }
}
