//! Input capture: turn a user-supplied path or URL into an [`UploadedImage`].
//!
//! This is the file-picker half of the upload zone. Local files are read
//! whole; URLs are downloaded into memory (the `image` crate decodes from a
//! byte buffer, so no temp file is needed). Either way the declared media
//! type is resolved once here and travels with the bytes.

use crate::error::VqaError;
use crate::media::{detect_media_type, MediaType};
use std::path::Path;
use tracing::{debug, info};

/// Raw image bytes as received from the input device.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Undecoded file content.
    pub bytes: Vec<u8>,
    /// Declared media type; the prepared image keeps it.
    pub media_type: MediaType,
    /// Original file name, forwarded as the multipart filename.
    pub file_name: String,
}

impl std::fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("media_type", &self.media_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl UploadedImage {
    /// Build an upload from in-memory bytes, e.g. a drop payload entry.
    ///
    /// `declared` is the content type reported alongside the bytes, if any.
    pub fn from_bytes(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        declared: Option<&str>,
    ) -> Result<Self, VqaError> {
        let file_name = file_name.into();
        let media_type = detect_media_type(&file_name, declared, &bytes)?;
        Ok(Self {
            bytes,
            media_type,
            file_name,
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an uploaded image.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedImage, VqaError> {
    if input.trim().is_empty() {
        return Err(VqaError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local image file.
async fn read_local(path: &Path) -> Result<UploadedImage, VqaError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(VqaError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(VqaError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let upload = UploadedImage::from_bytes(bytes, file_name, None)?;
    debug!(
        "Read local image: {} ({}, {} bytes)",
        path.display(),
        upload.media_type,
        upload.bytes.len()
    );
    Ok(upload)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedImage, VqaError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| VqaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            VqaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            VqaError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(VqaError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let file_name = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| VqaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let upload = UploadedImage::from_bytes(bytes.to_vec(), file_name, content_type.as_deref())?;
    info!(
        "Downloaded {} ({}, {} bytes)",
        upload.file_name,
        upload.media_type,
        upload.bytes.len()
    );
    Ok(upload)
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cat.jpg"));
        assert!(is_url("http://example.com/cat.jpg"));
        assert!(!is_url("/tmp/cat.jpg"));
        assert!(!is_url("cat.jpg"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(extract_filename("https://example.com/img/cat.jpg"), "cat.jpg");
        assert_eq!(extract_filename("https://example.com/img/photo"), "photo");
        assert_eq!(extract_filename("https://example.com/"), "downloaded");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, VqaError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, VqaError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_file_keeps_name_and_type() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(PNG_MAGIC).unwrap();

        let upload = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(upload.media_type, MediaType::Png);
        assert_eq!(upload.bytes, PNG_MAGIC);
        assert!(upload.file_name.ends_with(".png"));
    }
}
