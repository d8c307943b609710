//! # imagina-shared
//!
//! Value types, constants and pure helpers shared by the Imagina crates:
//! image payloads, generation parameters, data-URI transcoding and raster
//! operations.

pub mod constants;
pub mod error;
pub mod raster;
pub mod transcode;
pub mod types;

pub use error::{RasterError, TranscodeError};
pub use types::{GenerationParams, ImageData};
