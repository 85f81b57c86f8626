//! EVIO file read benchmark CLI application.
//!
//! Reads one or more EVIO (version 2 or 3) files, classifies every record and
//! reports size and throughput statistics.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use evio_core::scan::DEFAULT_PROGRESS_INTERVAL;
use evio_core::{
    Classification, FormatVersion, ScanConfig, ScanFailure, ScanObserver, ScanSummary, Scanner,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_USAGE: u8 = 1;
const EXIT_RUNTIME: u8 = 2;

/// Spinner updates are batched to keep the read loop cheap.
const SPINNER_BATCH: u64 = 4096;

/// Benchmark EVIO file read speed.
///
/// Reads CODA data files in EVIO format version 2 or 3 and reports record
/// counts, record sizes, wall time and throughput.
#[derive(Parser, Debug)]
#[command(name = "evio-bench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// EVIO file(s) (version 2 or 3)
    #[arg(value_name = "CODA_FILE")]
    inputs: Vec<PathBuf>,

    /// Print every physics event number divisible by N (0 disables)
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u32,

    /// Summary output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Suppress per-file and progress output
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    if args.inputs.is_empty() {
        print_usage();
        return ExitCode::from(EXIT_USAGE);
    }

    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ScanFailure>() {
                Some(failure) => eprintln!("{failure}"),
                None => eprintln!("ERROR: {err:#}"),
            }
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

fn print_usage() {
    let name = Args::command().get_name().to_string();
    println!("Usage: {name} <coda-file1> [<coda-file2> ...]");
    println!("  Benchmark EVIO file read speed");
    println!("  <coda-file> = EVIO file(s) (version 2 or 3)");
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    // Setup progress spinner
    let spinner = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
                .context("Invalid progress template")?,
        );
        pb
    };

    let mut console = Console {
        spinner,
        quiet: args.quiet,
        to_stderr: args.format == OutputFormat::Json,
        pending: 0,
    };

    let config = ScanConfig::new().with_progress_interval(args.progress_interval);
    let mut scanner = Scanner::new(config);
    let result = scanner.run_files(args.inputs.as_slice(), &mut console);
    console.spinner.finish_and_clear();

    let summary = result?;
    print_summary(&summary, args.format)
}

fn print_summary(summary: &ScanSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{summary}"),
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Console reporting for a scan.
struct Console {
    spinner: ProgressBar,
    quiet: bool,
    // Keeps stdout clean for JSON output
    to_stderr: bool,
    pending: u64,
}

impl Console {
    fn say(&self, line: String) {
        if self.quiet {
            return;
        }
        self.spinner.suspend(|| {
            if self.to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        });
    }
}

impl ScanObserver for Console {
    fn file_opened(&mut self, path: &Path, version: FormatVersion) {
        self.say(format!("Opened {}", path.display()));
        self.say(format!("EVIO version {version}"));
        self.spinner.set_message(format!(
            "in {:?}",
            path.file_name().unwrap_or_default()
        ));
    }

    fn record_read(&mut self, _record: &Classification) {
        self.pending += 1;
        if self.pending == SPINNER_BATCH {
            self.spinner.inc(self.pending);
            self.pending = 0;
        }
    }

    fn progress(&mut self, event_number: u32) {
        self.say(event_number.to_string());
    }

    fn file_finished(&mut self, _path: &Path, _records: u64) {
        self.spinner.inc(self.pending);
        self.pending = 0;
        self.say("End of file".to_string());
    }
}
