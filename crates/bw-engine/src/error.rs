//! Conversion errors and the integer status codes they collapse into.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Outcome of one conversion, as seen across the engine boundary.
///
/// The numeric values are stable and consumed by non-Rust callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    Success = 0,
    /// Input path missing or unreadable.
    IoError = 1,
    /// Input bytes are not a supported image, or are corrupt.
    DecodeError = 2,
    /// Output could not be written or renamed into place.
    EncodeError = 3,
    /// Threshold out of range or an empty path.
    InvalidArgument = 4,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::IoError),
            2 => Some(Self::DecodeError),
            3 => Some(Self::EncodeError),
            4 => Some(Self::InvalidArgument),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Short user-facing description.
    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "conversion succeeded",
            Self::IoError => "input file is missing or unreadable",
            Self::DecodeError => "input is not a supported image or is corrupt",
            Self::EncodeError => "output file could not be written",
            Self::InvalidArgument => "invalid argument",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Errors that can occur during a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode image: {reason}")]
    Decode { reason: String },

    #[error("Cannot write '{}': {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ConvertError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Encode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// The boundary status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::Io { .. } => Status::IoError,
            Self::Decode { .. } => Status::DecodeError,
            Self::Encode { .. } => Status::EncodeError,
            Self::InvalidArgument(_) => Status::InvalidArgument,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
