//! Command-line arguments.

use std::path::PathBuf;

use bw_engine::LumaWeights;
use clap::Parser;

/// Convert an image to a dithered black-and-white 1-bit PNG.
#[derive(Debug, Parser)]
#[command(name = "bwconvert", version, about)]
pub struct Args {
    /// Input image (PNG, JPEG, BMP, GIF, TGA, HDR, PSD, PIC, PNM, ...)
    pub input: PathBuf,

    /// Output PNG path
    pub output: PathBuf,

    /// Brightness cutoff, 0-255 [env: BWCONVERT_THRESHOLD] [default: 128]
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<i32>,

    /// Invert black and white after dithering [env: BWCONVERT_INVERT]
    #[arg(short, long)]
    pub invert: bool,

    /// Print per-stage diagnostics on stderr [env: BWCONVERT_VERBOSE]
    #[arg(short, long)]
    pub verbose: bool,

    /// Luminance weights: rec601 or rec709 [env: BWCONVERT_LUMA]
    #[arg(long, value_parser = parse_luma)]
    pub luma: Option<LumaWeights>,

    /// Resolution recorded in the PNG [env: BWCONVERT_DPI] [default: 300]
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Print the conversion report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

fn parse_luma(value: &str) -> Result<LumaWeights, String> {
    LumaWeights::parse(value).ok_or_else(|| format!("unknown luma weights '{value}'"))
}
