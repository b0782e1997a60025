//! Conversion orchestrator: load → grayscale → dither → (invert) → encode.
//!
//! Each call runs the whole pipeline synchronously on the calling thread and
//! owns every buffer it creates, so independent requests may run
//! concurrently on separate threads. Failures are terminal for the request
//! and surface as a single [`Status`].

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::buffer::{BinaryBuffer, GrayscaleBuffer};
use crate::dither::dither_with_progress;
use crate::encode::{physical_size_mm, write_bilevel_png};
use crate::error::{Result, Status};
use crate::grayscale::to_grayscale;
use crate::invert::invert;
use crate::loader::{LoadedImage, load_image};
use crate::request::ConversionRequest;


/// Pipeline position of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    Loading,
    Decoded,
    GrayscaleComputed,
    Dithered,
    Inverted,
    Encoded,
    Done,
    Error,
}

/// A pipeline step, as named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Grayscale,
    Dither,
    Invert,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Grayscale => "grayscale",
            Self::Dither => "dither",
            Self::Invert => "invert",
            Self::Encode => "encode",
        })
    }
}

/// Diagnostic record for one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub width: u32,
    pub height: u32,
    pub elapsed_us: u64,
}

/// Side-channel summary of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub source_format: String,
    pub source_channels: u8,
    pub width: u32,
    pub height: u32,
    pub threshold: u8,
    pub inverted: bool,
    pub white_pixels: u64,
    pub output_bytes: u64,
    pub dpi: u32,
    pub width_mm: f64,
    pub height_mm: f64,
    pub stages: Vec<StageRecord>,
    pub total_us: u64,
}

impl ConversionReport {
    /// Fraction of output pixels that are white.
    pub fn white_fraction(&self) -> f64 {
        let total = u64::from(self.width) * u64::from(self.height);
        if total == 0 {
            0.0
        } else {
            self.white_pixels as f64 / total as f64
        }
    }
}

/// Run one conversion and reduce the outcome to a status code.
///
/// Never panics on bad input and never leaves a partial file at the output
/// path.
pub fn convert(request: &ConversionRequest) -> Status {
    match try_convert(request) {
        Ok(_) => Status::Success,
        Err(e) => {
            let status = e.status();
            warn!(code = status.code(), "Conversion failed: {e}");
            status
        }
    }
}

/// Raw-argument form of [`convert`] returning the integer code.
pub fn convert_raw(
    input: &str,
    output: &str,
    threshold: i32,
    invert: bool,
    verbose: bool,
) -> i32 {
    let request = ConversionRequest::new(input, output, threshold)
        .with_invert(invert)
        .with_verbose(verbose);
    convert(&request).code()
}

/// Run one conversion, returning the typed error on failure.
pub fn try_convert(request: &ConversionRequest) -> Result<ConversionReport> {
    let started = Instant::now();
    let mut pipeline = Pipeline::new(request.verbose);

    let threshold = request.validate().inspect_err(|_| pipeline.fail())?;

    pipeline.transition(State::Loading);
    let loaded = pipeline.stage(
        Stage::Load,
        State::Decoded,
        || load_image(&request.input),
        |l: &LoadedImage| l.pixels.dimensions(),
    )?;
    let (width, height) = loaded.pixels.dimensions();
    let source_format = loaded.format.to_string();
    let source_channels = loaded.pixels.channels();
    if request.verbose {
        info!(
            format = %source_format,
            channels = source_channels,
            "Loaded '{}' ({width}x{height})",
            request.input.display()
        );
    }

    let gray = pipeline.stage(
        Stage::Grayscale,
        State::GrayscaleComputed,
        || Ok(to_grayscale(&loaded.pixels, request.luma)),
        GrayscaleBuffer::dimensions,
    )?;
    drop(loaded);

    let mut binary = pipeline.stage(
        Stage::Dither,
        State::Dithered,
        || {
            Ok(dither_with_progress(&gray, threshold, |row, rows| {
                if request.verbose {
                    info!("Row {row}/{rows}");
                } else {
                    trace!(row, rows, "Dithering progress");
                }
            }))
        },
        BinaryBuffer::dimensions,
    )?;
    drop(gray);

    if request.invert {
        binary = pipeline.stage(
            Stage::Invert,
            State::Inverted,
            || Ok(invert(binary)),
            BinaryBuffer::dimensions,
        )?;
    }

    let (width_mm, height_mm) = physical_size_mm(width, height, request.dpi);
    if request.verbose {
        info!("Writing '{}'", request.output.display());
        info!(
            "Output: {width}x{height} px (~{width_mm:.2}mm x {height_mm:.2}mm at {}dpi)",
            request.dpi
        );
    }
    let output_bytes = pipeline.stage(
        Stage::Encode,
        State::Encoded,
        || write_bilevel_png(&binary, &request.output, request.dpi),
        |_| binary.dimensions(),
    )?;

    pipeline.transition(State::Done);
    let report = ConversionReport {
        input: request.input.clone(),
        output: request.output.clone(),
        source_format,
        source_channels,
        width,
        height,
        threshold,
        inverted: request.invert,
        white_pixels: binary.white_count(),
        output_bytes,
        dpi: request.dpi,
        width_mm,
        height_mm,
        stages: pipeline.records,
        total_us: micros(started.elapsed()),
    };

    if request.verbose {
        info!(
            total_us = report.total_us,
            white_fraction = report.white_fraction(),
            "Conversion complete"
        );
    } else {
        debug!(total_us = report.total_us, "Conversion complete");
    }
    Ok(report)
}

/// Tracks pipeline state and collects per-stage records.
struct Pipeline {
    verbose: bool,
    state: State,
    records: Vec<StageRecord>,
}

impl Pipeline {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state: State::Idle,
            records: Vec::new(),
        }
    }

    fn transition(&mut self, next: State) {
        trace!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    fn fail(&mut self) {
        self.transition(State::Error);
    }

    /// Run one timed stage, moving to `next` on success or `Error` on failure.
    fn stage<T>(
        &mut self,
        stage: Stage,
        next: State,
        run: impl FnOnce() -> Result<T>,
        dimensions: impl FnOnce(&T) -> (u32, u32),
    ) -> Result<T> {
        let started = Instant::now();
        let value = run().inspect_err(|_| self.fail())?;
        let (width, height) = dimensions(&value);
        let record = StageRecord {
            stage,
            width,
            height,
            elapsed_us: micros(started.elapsed()),
        };

        if self.verbose {
            info!(%stage, width, height, elapsed_us = record.elapsed_us, "Stage complete");
        } else {
            debug!(%stage, width, height, elapsed_us = record.elapsed_us, "Stage complete");
        }
        self.records.push(record);
        self.transition(next);
        Ok(value)
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
