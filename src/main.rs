mod adalite;
mod base;
mod config;
mod data_parser;
mod error;
mod kraken;
mod output;
mod reader;
mod time;
mod trezor;

use std::{
    io::{stderr, stdout},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Result;
use clap::Parser;
use config::Config;
use data_parser::DataParser;
use linkme::distributed_slice;
use output::OutputFormat;
use tracing::{error, info, level_filters::LevelFilter};

#[distributed_slice]
pub(crate) static DATA_PARSERS: [DataParser];

/// Converts exchange and wallet exports into unified transaction records
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// The exported CSV files to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Config file, instead of config.json in the user's config directory
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Where to write the records, standard output if not given
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// One of off, error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
    /// Logs every converted row
    #[arg(long)]
    debug: bool,
}

/// Debug mode raises the level far enough to show every converted row.
fn log_level(requested: LevelFilter, debug: bool) -> LevelFilter {
    if debug {
        requested.max(LevelFilter::DEBUG)
    } else {
        requested
    }
}

// Records may go to stdout, so logging uses stderr
fn setup_logging(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(stderr)
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.debug |= cli.debug;

    setup_logging(log_level(cli.log_level, config.debug));

    let mut records = Vec::new();
    let mut all_converted = true;
    for path in &cli.files {
        match reader::convert_file(path, config.timestamp_hints()) {
            Ok(converted) => {
                info!(
                    "{}: {} records as {}",
                    path.display(),
                    converted.records.len(),
                    converted.parser.name
                );
                all_converted &= converted.failures.is_empty();
                records.extend(converted.records);
            }
            Err(err) => {
                error!("{:#}", err);
                all_converted = false;
            }
        }
    }

    info!("{} records converted", records.len());

    match &cli.output {
        Some(output_path) => output::save_records(&records, cli.format, output_path)?,
        None => output::write_records(&records, cli.format, stdout().lock())?,
    }

    Ok(all_converted)
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_raises_log_level() {
        assert_eq!(log_level(LevelFilter::WARN, false), LevelFilter::WARN);
        assert_eq!(log_level(LevelFilter::WARN, true), LevelFilter::DEBUG);
        assert_eq!(log_level(LevelFilter::TRACE, true), LevelFilter::TRACE);
    }

    #[test]
    fn command_line() {
        let cli = Cli::try_parse_from(["cryptoconv", "--format", "csv", "--log-level", "info", "kraken.csv"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Csv);
        assert_eq!(cli.log_level, LevelFilter::INFO);
        assert_eq!(cli.files, vec![PathBuf::from("kraken.csv")]);
        assert!(!cli.debug);

        assert!(Cli::try_parse_from(["cryptoconv", "--log-level", "loud", "kraken.csv"]).is_err());
        assert!(Cli::try_parse_from(["cryptoconv"]).is_err());
    }
}
