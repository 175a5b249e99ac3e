//! Filename and content-type classification for selected files.
//!
//! Browsers and camera pickers report a declared MIME type that is often
//! missing or generic (`application/octet-stream`), so every check here
//! falls back to the filename extension, and HEIF detection also looks at
//! the ISO-BMFF `ftyp` brand in the bytes themselves.
//!
//! ## Display Names
//!
//! The display name is the last path component. After a legacy image is
//! converted its extension is swapped to match the new bytes:
//! - `IMG_0042.HEIC` → `IMG_0042.jpg`
//! - `putter` → `putter.jpg`

use std::path::Path;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "webm", "mkv", "avi", "3gp", "wmv", "mpeg", "mpg",
];

const LEGACY_EXTENSIONS: &[&str] = &["heic", "heif", "hif"];

const LEGACY_MIME_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

/// `ftyp` brands written by phone cameras for HEIF stills.
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"mif1", b"msf1", b"hevc"];

/// Lowercased extension of a filename, if any.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Last path component, falling back to the input when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Replace (or add) the extension of a display name.
pub fn with_extension(name: &str, ext: &str) -> String {
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    format!("{}.{}", stem, ext)
}

/// True when the declared type or the extension says video.
pub fn is_video(content_type: Option<&str>, name: &str) -> bool {
    if let Some(ct) = content_type
        && ct.to_ascii_lowercase().starts_with("video/")
    {
        return true;
    }
    extension(name).is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

/// True for camera-native formats that need conversion before decoding.
pub fn is_legacy_camera_format(content_type: Option<&str>, name: &str) -> bool {
    if let Some(ct) = content_type
        && LEGACY_MIME_TYPES.contains(&ct.to_ascii_lowercase().as_str())
    {
        return true;
    }
    extension(name).is_some_and(|e| LEGACY_EXTENSIONS.contains(&e.as_str()))
}

/// True when `bytes` start with an ISO-BMFF `ftyp` box carrying a HEIF brand.
pub fn looks_like_heif(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == brand.as_slice())
}

/// Best-effort MIME type: sniffed from the bytes, then guessed from the name.
pub fn content_type_for(bytes: &[u8], name: &str) -> Option<&'static str> {
    if looks_like_heif(bytes) {
        return Some("image/heic");
    }
    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type());
    }
    let ext = extension(name)?;
    if LEGACY_EXTENSIONS.contains(&ext.as_str()) {
        return Some("image/heic");
    }
    image::ImageFormat::from_extension(&ext).map(|f| f.to_mime_type())
}
