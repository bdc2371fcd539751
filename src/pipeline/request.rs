//! The outbound call: one multipart `POST` carrying the image and question.
//!
//! [`AskBackend`] is the seam the controller talks to. [`HttpAskBackend`] is
//! the real implementation; tests and embedders can hand the controller any
//! other backend through [`crate::config::AskConfigBuilder::backend`].
//!
//! No retries: a failed request is reported once and the controller shows
//! the fixed error answer.

use crate::config::AskConfig;
use crate::error::{TransportError, VqaError};
use crate::pipeline::prepare::PreparedImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Multipart field carrying the prepared image bytes.
pub const IMAGE_FIELD: &str = "image";
/// Multipart field carrying the question text.
pub const QUESTION_FIELD: &str = "question";

/// Longest error-body excerpt kept in [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Success body of the answering endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub description: String,
}

/// Something that can answer a question about a prepared image.
#[async_trait]
pub trait AskBackend: Send + Sync {
    /// Send one request and return the answer text.
    async fn ask(&self, image: &PreparedImage, question: &str) -> Result<String, TransportError>;
}

/// Talks to the answering endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAskBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: Option<u64>,
}

impl HttpAskBackend {
    /// Build a backend for `config.endpoint`, honouring `request_timeout_secs`.
    pub fn new(config: &AskConfig) -> Result<Self, VqaError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| VqaError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        match (e.is_timeout(), self.timeout_secs) {
            (true, Some(secs)) => TransportError::Timeout {
                endpoint: self.endpoint.clone(),
                secs,
            },
            _ => TransportError::Network {
                endpoint: self.endpoint.clone(),
                detail: e.to_string(),
            },
        }
    }
}

/// Build the multipart body: an `image` file part and a `question` text part.
pub fn build_form(image: &PreparedImage, question: &str) -> Result<Form, TransportError> {
    let part = Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(image.media_type.as_mime())
        .map_err(|e| TransportError::InvalidRequest {
            detail: e.to_string(),
        })?;

    Ok(Form::new()
        .part(IMAGE_FIELD, part)
        .text(QUESTION_FIELD, question.to_string()))
}

/// Parse a success body into the answer text.
pub fn parse_answer(body: &[u8]) -> Result<String, TransportError> {
    serde_json::from_slice::<AskResponse>(body)
        .map(|r| r.description)
        .map_err(|e| TransportError::MalformedResponse {
            detail: e.to_string(),
        })
}

#[async_trait]
impl AskBackend for HttpAskBackend {
    async fn ask(&self, image: &PreparedImage, question: &str) -> Result<String, TransportError> {
        let start = Instant::now();
        let form = build_form(image, question)?;
        info!(
            "Asking {} about {} ({} bytes)",
            self.endpoint,
            image.file_name,
            image.bytes.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let excerpt: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let answer = parse_answer(&body)?;
        debug!(
            "Answer received: {} chars in {:?}",
            answer.len(),
            start.elapsed()
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    fn prepared() -> PreparedImage {
        PreparedImage {
            bytes: vec![1, 2, 3],
            media_type: MediaType::Png,
            file_name: "cat.png".into(),
            width: 1,
            height: 1,
            original_width: 1,
            original_height: 1,
        }
    }

    #[test]
    fn parse_answer_reads_description() {
        assert_eq!(parse_answer(br#"{"description":"a cat"}"#).unwrap(), "a cat");
        assert_eq!(
            parse_answer(br#"{"description":"a dog","model":"x"}"#).unwrap(),
            "a dog"
        );
    }

    #[test]
    fn parse_answer_rejects_other_shapes() {
        for body in [&b"not json"[..], br#"{"answer":"a cat"}"#, br#"{"description":7}"#, b""] {
            let err = parse_answer(body).unwrap_err();
            assert!(matches!(err, TransportError::MalformedResponse { .. }));
        }
    }

    #[test]
    fn form_has_a_boundary() {
        let form = build_form(&prepared(), "what is this?").unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[test]
    fn backend_uses_configured_endpoint() {
        let config = AskConfig::builder()
            .endpoint("http://127.0.0.1:9/api/ask")
            .build()
            .unwrap();
        let backend = HttpAskBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint(), "http://127.0.0.1:9/api/ask");
    }
}
