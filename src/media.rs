//! Media types the preparer can round-trip.
//!
//! A prepared image is always re-encoded in the *same* media type as the
//! upload, so the set below is the intersection of what the `image` crate can
//! both decode and encode with the features we compile in.

use crate::error::VqaError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// An encodable image media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/bmp")]
    Bmp,
    #[serde(rename = "image/webp")]
    WebP,
}

impl MediaType {
    /// The MIME string sent as the multipart part's content type.
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::Bmp => "image/bmp",
            MediaType::WebP => "image/webp",
        }
    }

    /// The `image` crate format used for encoding.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            MediaType::Png => ImageFormat::Png,
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Gif => ImageFormat::Gif,
            MediaType::Bmp => ImageFormat::Bmp,
            MediaType::WebP => ImageFormat::WebP,
        }
    }

    /// Map an `image` crate format back onto a supported media type.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(MediaType::Png),
            ImageFormat::Jpeg => Some(MediaType::Jpeg),
            ImageFormat::Gif => Some(MediaType::Gif),
            ImageFormat::Bmp => Some(MediaType::Bmp),
            ImageFormat::WebP => Some(MediaType::WebP),
            _ => None,
        }
    }

    /// Parse a MIME string, ignoring parameters and case.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(MediaType::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(MediaType::Jpeg),
            "image/gif" => Some(MediaType::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(MediaType::Bmp),
            "image/webp" => Some(MediaType::WebP),
            _ => None,
        }
    }

    /// Guess from the file name's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        ImageFormat::from_path(path)
            .ok()
            .and_then(Self::from_image_format)
    }

    /// Guess from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes)
            .ok()
            .and_then(Self::from_image_format)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// Determine the declared media type of an upload.
///
/// Precedence: an `image/*` content type supplied with the upload, then the
/// file extension, then the magic bytes. A declared `image/*` type we cannot
/// encode is an error rather than a fallback, because the output must keep
/// the declared type.
pub fn detect_media_type(
    file_name: &str,
    declared: Option<&str>,
    bytes: &[u8],
) -> Result<MediaType, VqaError> {
    if let Some(mime) = declared {
        if let Some(media_type) = MediaType::from_mime(mime) {
            return Ok(media_type);
        }
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(VqaError::UnsupportedMediaType {
                file_name: file_name.to_string(),
                media_type: mime.trim().to_string(),
            });
        }
    }

    if let Some(media_type) = MediaType::from_path(file_name) {
        return Ok(media_type);
    }

    MediaType::sniff(bytes).ok_or_else(|| VqaError::UnsupportedMediaType {
        file_name: file_name.to_string(),
        media_type: declared.unwrap_or("unknown").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn mime_aliases_and_parameters() {
        assert_eq!(MediaType::from_mime("image/jpg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_mime("IMAGE/PNG"), Some(MediaType::Png));
        assert_eq!(
            MediaType::from_mime("image/webp; q=0.9"),
            Some(MediaType::WebP)
        );
        assert_eq!(MediaType::from_mime("image/tiff"), None);
        assert_eq!(MediaType::from_mime("text/plain"), None);
    }

    #[test]
    fn image_format_mapping_is_consistent() {
        for mt in [
            MediaType::Png,
            MediaType::Jpeg,
            MediaType::Gif,
            MediaType::Bmp,
            MediaType::WebP,
        ] {
            assert_eq!(MediaType::from_image_format(mt.image_format()), Some(mt));
            assert_eq!(MediaType::from_mime(mt.as_mime()), Some(mt));
        }
    }

    #[test]
    fn detect_prefers_declared_type() {
        let mt = detect_media_type("photo.png", Some("image/jpeg"), PNG_MAGIC).unwrap();
        assert_eq!(mt, MediaType::Jpeg);
    }

    #[test]
    fn detect_falls_back_to_extension_then_magic() {
        let mt = detect_media_type("photo.JPG", Some("application/octet-stream"), b"").unwrap();
        assert_eq!(mt, MediaType::Jpeg);

        let mt = detect_media_type("upload", None, PNG_MAGIC).unwrap();
        assert_eq!(mt, MediaType::Png);
    }

    #[test]
    fn detect_rejects_unencodable_image_type() {
        let err = detect_media_type("scan.tiff", Some("image/tiff"), b"").unwrap_err();
        assert!(matches!(err, VqaError::UnsupportedMediaType { .. }));

        let err = detect_media_type("notes.txt", None, b"hello").unwrap_err();
        assert!(matches!(err, VqaError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn serde_uses_mime_strings() {
        let json = serde_json::to_string(&MediaType::WebP).unwrap();
        assert_eq!(json, "\"image/webp\"");
    }
}
