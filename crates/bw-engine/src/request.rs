//! The unit of work handed to the conversion engine.

use std::path::{Path, PathBuf};

use crate::dither::DEFAULT_THRESHOLD;
use crate::encode::DEFAULT_DPI;
use crate::error::ConvertError;
use crate::grayscale::LumaWeights;

/// Everything one conversion needs. Immutable once passed to
/// [`convert`](crate::convert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Luminance cutoff; only 0..=255 is accepted.
    pub threshold: i32,
    /// Swap black and white after dithering.
    pub invert: bool,
    /// Emit per-stage diagnostics at info level.
    pub verbose: bool,
    pub luma: LumaWeights,
    /// Resolution recorded in the output PNG.
    pub dpi: u32,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, threshold: i32) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            threshold,
            invert: false,
            verbose: false,
            luma: LumaWeights::default(),
            dpi: DEFAULT_DPI,
        }
    }

    /// Builder: set invert flag.
    pub fn with_invert(mut self, val: bool) -> Self {
        self.invert = val;
        self
    }

    /// Builder: set verbose flag.
    pub fn with_verbose(mut self, val: bool) -> Self {
        self.verbose = val;
        self
    }

    /// Builder: set luminance weights.
    pub fn with_luma(mut self, val: LumaWeights) -> Self {
        self.luma = val;
        self
    }

    /// Builder: set output resolution.
    pub fn with_dpi(mut self, val: u32) -> Self {
        self.dpi = val;
        self
    }

    /// Check arguments before any file is touched; returns the threshold as
    /// a byte.
    pub fn validate(&self) -> Result<u8, ConvertError> {
        if is_empty_path(&self.input) {
            return Err(ConvertError::InvalidArgument("input path is empty".into()));
        }
        if is_empty_path(&self.output) {
            return Err(ConvertError::InvalidArgument("output path is empty".into()));
        }
        if self.dpi == 0 {
            return Err(ConvertError::InvalidArgument("dpi must be positive".into()));
        }
        u8::try_from(self.threshold).map_err(|_| {
            ConvertError::InvalidArgument(format!(
                "threshold must be between 0 and 255, got {}",
                self.threshold
            ))
        })
    }
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self::new(PathBuf::new(), PathBuf::new(), i32::from(DEFAULT_THRESHOLD))
    }
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
