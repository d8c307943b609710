/// Application name
pub const APP_NAME: &str = "Imagina";

/// Records per page in the gallery grid
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Generation parameter defaults, also used for rows that predate them
pub const DEFAULT_ARTISTIC_STYLE: &str = "none";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_IMAGE_QUALITY: &str = "standard";

/// MIME type assumed when a data URI omits one
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Longest prompt accepted by the generation flow, in characters
pub const MAX_PROMPT_CHARS: usize = 500;

/// Number of entries kept per statistics chart
pub const STATS_TOP_N: usize = 15;

/// JPEG quality used when re-encoding a resized image
pub const JPEG_RESIZE_QUALITY: u8 = 92;

/// Upper bound for either side of a resized image, in pixels
pub const MAX_RESIZE_DIMENSION: u32 = 8192;
