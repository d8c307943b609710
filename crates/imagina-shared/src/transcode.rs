//! Lossless conversion between binary image payloads and `data:` URIs.
//!
//! Only used at the JSON export/import boundary; records in the store always
//! keep raw bytes.  The media type is carried verbatim, parameters and
//! surrounding whitespace included, so any MIME string the store accepts
//! survives an export/import cycle.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::constants::FALLBACK_MIME_TYPE;
use crate::error::TranscodeError;
use crate::types::ImageData;

/// Escaped inside the media type when building the header.
const MEDIA_TYPE_ENCODE_SET: &AsciiSet = &CONTROLS.add(b' ').add(b',').add(b'%');

const BASE64_MARKER: &str = ";base64";

/// Encode an image as `data:<mime>;base64,<payload>`.
pub fn encode_data_uri(image: &ImageData) -> String {
    let mime = if image.mime_type.trim().is_empty() {
        FALLBACK_MIME_TYPE.to_string()
    } else {
        utf8_percent_encode(&image.mime_type, MEDIA_TYPE_ENCODE_SET).to_string()
    };
    format!("data:{}{},{}", mime, BASE64_MARKER, STANDARD.encode(&image.bytes))
}

/// Decode a base64 `data:` URI back into raw bytes and MIME type.
///
/// Everything between `data:` and the trailing `;base64` is the media type,
/// percent-unescaped.
pub fn decode_data_uri(uri: &str) -> Result<ImageData, TranscodeError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(TranscodeError::MissingScheme)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(TranscodeError::MissingSeparator)?;

    let marker_at = header
        .len()
        .checked_sub(BASE64_MARKER.len())
        .filter(|&at| header.is_char_boundary(at))
        .filter(|&at| header[at..].eq_ignore_ascii_case(BASE64_MARKER))
        .ok_or(TranscodeError::NotBase64)?;

    let mime = percent_decode_str(&header[..marker_at])
        .decode_utf8()
        .map_err(|_| TranscodeError::InvalidMediaType)?;

    let bytes = STANDARD.decode(payload.trim())?;
    let mime_type = if mime.trim().is_empty() {
        FALLBACK_MIME_TYPE.to_string()
    } else {
        mime.into_owned()
    };

    Ok(ImageData { mime_type, bytes })
}
