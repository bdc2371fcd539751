//! Error types for the edgequake-vqa library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`VqaError`] — **Fatal or validation**: the image could not be captured
//!   or prepared, or a submit precondition was violated (no image, empty
//!   question). Returned as `Err(VqaError)`; nothing is sent over the network.
//!
//! * [`TransportError`] — **Per-request**: the call to the answering endpoint
//!   failed (network, status, malformed body). It never escapes the
//!   [`crate::controller::SubmissionController`]: the controller logs it and
//!   shows a fixed answer string in place of a real answer.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal and validation errors returned by the edgequake-vqa library.
#[derive(Debug, Error)]
pub enum VqaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Image errors ──────────────────────────────────────────────────────
    /// The declared media type is not an image type we can re-encode.
    #[error("Unsupported media type '{media_type}' for '{file_name}'\nSupported: image/png, image/jpeg, image/gif, image/bmp, image/webp")]
    UnsupportedMediaType {
        file_name: String,
        media_type: String,
    },

    /// The bytes could not be decoded as an image.
    #[error("Could not decode image '{file_name}': {detail}")]
    DecodeFailed { file_name: String, detail: String },

    /// The resized surface could not be re-encoded.
    #[error("Could not encode '{file_name}' as {media_type}: {detail}")]
    EncodeFailed {
        file_name: String,
        media_type: String,
        detail: String,
    },

    // ── Validation errors ─────────────────────────────────────────────────
    /// Submit was attempted before an image was selected.
    #[error("Please select an image first.")]
    MissingImage,

    /// Submit was attempted with an empty question.
    #[error("Please enter a question about the image.")]
    EmptyQuestion,

    /// A drop payload carried no files.
    #[error("Nothing to upload: the dropped payload contains no files.")]
    EmptyDropPayload,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the prepared image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VqaError {
    /// True for precondition violations caught before any network call.
    ///
    /// These are user mistakes, reported immediately with no state change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VqaError::MissingImage | VqaError::EmptyQuestion | VqaError::EmptyDropPayload
        )
    }
}

/// A failure during or after the call to the answering endpoint.
///
/// Collapsed to a single fixed answer string in the UI; the variant only
/// matters for diagnostics.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset mid-body, …
    #[error("Request to '{endpoint}' failed: {detail}")]
    Network { endpoint: String, detail: String },

    /// The configured request timeout elapsed.
    #[error("Request to '{endpoint}' timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("Endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not `{ "description": string }`.
    #[error("Malformed response body: {detail}")]
    MalformedResponse { detail: String },

    /// The multipart request could not be built.
    #[error("Could not build request: {detail}")]
    InvalidRequest { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(VqaError::MissingImage.is_validation());
        assert!(VqaError::EmptyQuestion.is_validation());
        assert!(VqaError::EmptyDropPayload.is_validation());
        assert!(!VqaError::Internal("x".into()).is_validation());
        assert!(!VqaError::DecodeFailed {
            file_name: "a.png".into(),
            detail: "bad".into()
        }
        .is_validation());
    }

    #[test]
    fn unsupported_media_type_display() {
        let e = VqaError::UnsupportedMediaType {
            file_name: "scan.tiff".into(),
            media_type: "image/tiff".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("image/tiff"), "got: {msg}");
        assert!(msg.contains("scan.tiff"), "got: {msg}");
    }

    #[test]
    fn status_display() {
        let e = TransportError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("overloaded"));
    }

    #[test]
    fn timeout_display() {
        let e = TransportError::Timeout {
            endpoint: "http://localhost:3000/api/ask".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }
}
