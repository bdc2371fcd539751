//! Result types returned by the one-shot [`crate::ask::ask`] entry point.

use crate::pipeline::prepare::PreparedImage;
use serde::Serialize;

/// Everything a one-shot ask produced.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutput {
    /// The question as sent.
    pub question: String,
    /// Displayed answer: the endpoint's text, or the fixed error answer.
    pub answer: String,
    /// `true` when `answer` came from the endpoint.
    pub answered: bool,
    /// The image that was sent (bytes omitted when serialised).
    pub image: PreparedImage,
    pub stats: AskStats,
}

/// Timing and size figures for one ask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AskStats {
    /// Bytes of the image as captured.
    pub source_bytes: usize,
    /// Bytes of the prepared image as uploaded.
    pub prepared_bytes: usize,
    pub prepare_duration_ms: u64,
    pub request_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl AskStats {
    /// Prepared size relative to the source; below 1.0 means the upload shrank.
    pub fn size_ratio(&self) -> f64 {
        if self.source_bytes == 0 {
            return 1.0;
        }
        self.prepared_bytes as f64 / self.source_bytes as f64
    }
}
