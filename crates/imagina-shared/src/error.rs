use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Not a data URI: missing 'data:' prefix")]
    MissingScheme,

    #[error("Malformed data URI: missing ',' separator")]
    MissingSeparator,

    #[error("Only base64 data URIs are supported")]
    NotBase64,

    #[error("Media type is not valid UTF-8 once unescaped")]
    InvalidMediaType,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
