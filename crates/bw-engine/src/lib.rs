//! Black-and-white image conversion engine.
//!
//! Decodes a raster image, reduces it to luminance, dithers it to pure
//! black and white with Floyd-Steinberg error diffusion, optionally inverts
//! it and writes a 1-bit grayscale PNG atomically.

pub mod buffer;
pub mod convert;
pub mod dither;
pub mod encode;
pub mod error;
pub mod grayscale;
pub mod invert;
pub mod loader;
pub mod request;

// Re-exports for convenience
pub use buffer::{BinaryBuffer, GrayscaleBuffer, PixelBuffer};
pub use convert::{ConversionReport, Stage, StageRecord, State, convert, convert_raw, try_convert};
pub use dither::{
    DEFAULT_THRESHOLD, dither_with_progress, floyd_steinberg_dither, threshold_binarize,
};
pub use encode::{DEFAULT_DPI, write_bilevel_png};
pub use error::{ConvertError, Result, Status};
pub use grayscale::{LumaWeights, to_grayscale};
pub use invert::invert;
pub use loader::{LoadedImage, SourceFormat, load_image};
pub use request::ConversionRequest;
