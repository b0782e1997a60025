//! `bwconvert`: dither an image to a 1-bit black-and-white PNG.
//!
//! The process exit code is the engine status code (0 success, 1 I/O,
//! 2 decode, 3 encode, 4 invalid argument).

mod args;
mod config;

use std::process::ExitCode;

use anyhow::Context;
use bw_engine::{ConversionRequest, Status, try_convert};
use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use args::Args;
use config::{CliConfig, load_dotenv};

fn main() -> ExitCode {
    let args = Args::parse();

    let dotenv = load_dotenv();
    let (config, rejected) = CliConfig::from_env();
    let request = config.request(&args);

    init_tracing(request.verbose);
    match dotenv {
        Some(path) => debug!("Loaded .env from: {path}"),
        None => debug!("No .env file found, using system environment variables"),
    }
    for setting in &rejected {
        warn!(
            key = setting.key,
            value = %setting.value,
            "Ignoring invalid setting: {}",
            setting.reason
        );
    }

    match run(&request, args.json) {
        Ok(status) => exit_code(status),
        Err(e) => {
            error!("{e:#}");
            exit_code(Status::IoError)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins; otherwise verbose runs
/// show `info` and quiet runs only warnings.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(request: &ConversionRequest, json: bool) -> anyhow::Result<Status> {
    let report = match try_convert(request) {
        Ok(report) => report,
        Err(e) => {
            let status = e.status();
            error!(code = status.code(), "{e}");
            return Ok(status);
        }
    };

    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{text}");
    }
    Ok(Status::Success)
}

fn exit_code(status: Status) -> ExitCode {
    ExitCode::from(u8::try_from(status.code()).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_pgm(path: &Path) {
        let mut bytes = b"P5\n4 2\n255\n".to_vec();
        bytes.extend_from_slice(&[0, 60, 120, 180, 240, 200, 100, 20]);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_run_success_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pgm");
        let output = dir.path().join("out.png");
        write_pgm(&input);

        let request = ConversionRequest::new(&input, &output, 128);
        assert_eq!(run(&request, true).unwrap(), Status::Success);
        assert!(output.is_file());
    }

    #[test]
    fn test_run_reports_engine_status() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");

        let missing = ConversionRequest::new(dir.path().join("missing.png"), &output, 128);
        assert_eq!(run(&missing, false).unwrap(), Status::IoError);

        let bad_threshold = ConversionRequest::new(dir.path().join("missing.png"), &output, 256);
        assert_eq!(run(&bad_threshold, false).unwrap(), Status::InvalidArgument);
        assert!(!output.exists());
    }

    #[test]
    fn test_exit_code_matches_status() {
        for status in [
            Status::Success,
            Status::IoError,
            Status::DecodeError,
            Status::EncodeError,
            Status::InvalidArgument,
        ] {
            let expected = ExitCode::from(status.code() as u8);
            assert_eq!(exit_code(status), expected);
        }
    }
}
