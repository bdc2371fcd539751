//! Configuration types for preparing images and asking questions about them.
//!
//! All behaviour is controlled through [`AskConfig`], built via its
//! [`AskConfigBuilder`]. The preparer only sees the narrower
//! [`PrepareOptions`] projection so it stays testable at any bounds without
//! an endpoint or a backend in sight.

use crate::error::VqaError;
use crate::observer::SessionObserver;
use crate::pipeline::request::AskBackend;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default bounding box for prepared images, in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_MAX_HEIGHT: u32 = 800;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/ask";

/// Answer shown in place of a real one when the request fails for any reason.
pub const DEFAULT_ERROR_ANSWER: &str = "Sorry, something went wrong while answering your question.";

/// Options for the image preparer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Maximum output width in pixels. Default: 800.
    pub max_width: u32,
    /// Maximum output height in pixels. Default: 800.
    pub max_height: u32,
    /// Resampling filter for the single downscale draw. Default: [`ResizeFilter::Triangle`].
    pub filter: ResizeFilter,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            filter: ResizeFilter::default(),
        }
    }
}

/// Resampling filter used when the image has to shrink.
///
/// `Triangle` (bilinear) is what browsers use for a default canvas draw and
/// is the default here; `Lanczos3` is sharper but several times slower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(f: ResizeFilter) -> Self {
        match f {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for a question-answering session.
///
/// Built via [`AskConfig::builder()`] or using [`AskConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_vqa::AskConfig;
///
/// let config = AskConfig::builder()
///     .max_width(1024)
///     .max_height(768)
///     .endpoint("http://localhost:8080/api/ask")
///     .build()
///     .unwrap();
/// assert_eq!(config.prepare_options().max_width, 1024);
/// ```
#[derive(Clone)]
pub struct AskConfig {
    /// Maximum prepared width in pixels. Default: 800.
    pub max_width: u32,

    /// Maximum prepared height in pixels. Default: 800.
    pub max_height: u32,

    /// Resampling filter. Default: triangle.
    pub filter: ResizeFilter,

    /// Full URL of the answering endpoint. Default: `http://localhost:3000/api/ask`.
    pub endpoint: String,

    /// Per-request timeout in seconds. Default: none; the request resolves
    /// or fails purely on network behaviour.
    pub request_timeout_secs: Option<u64>,

    /// Download timeout for URL image inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Answer text shown when the request fails. Default: [`DEFAULT_ERROR_ANSWER`].
    pub error_answer: String,

    /// Pre-constructed backend. Takes precedence over `endpoint`.
    pub backend: Option<Arc<dyn AskBackend>>,

    /// Receives preview, loading and answer events. Default: none.
    pub observer: Option<Arc<dyn SessionObserver>>,
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            filter: ResizeFilter::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: None,
            download_timeout_secs: 120,
            error_answer: DEFAULT_ERROR_ANSWER.to_string(),
            backend: None,
            observer: None,
        }
    }
}

impl fmt::Debug for AskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskConfig")
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("filter", &self.filter)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("error_answer", &self.error_answer)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn AskBackend>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl AskConfig {
    /// Create a new builder for `AskConfig`.
    pub fn builder() -> AskConfigBuilder {
        AskConfigBuilder {
            config: Self::default(),
        }
    }

    /// The subset of settings the preparer needs.
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            filter: self.filter,
        }
    }
}

/// Builder for [`AskConfig`].
pub struct AskConfigBuilder {
    config: AskConfig,
}

impl fmt::Debug for AskConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AskConfigBuilder {
    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height = px;
        self
    }

    pub fn filter(mut self, filter: ResizeFilter) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn error_answer(mut self, text: impl Into<String>) -> Self {
        self.config.error_answer = text.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn AskBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AskConfig, VqaError> {
        let c = &self.config;
        if c.max_width == 0 || c.max_height == 0 {
            return Err(VqaError::InvalidConfig(format!(
                "Bounds must be ≥ 1 px, got {}x{}",
                c.max_width, c.max_height
            )));
        }
        if c.backend.is_none() {
            let url = reqwest::Url::parse(&c.endpoint).map_err(|e| {
                VqaError::InvalidConfig(format!("Endpoint '{}' is not a URL: {}", c.endpoint, e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(VqaError::InvalidConfig(format!(
                    "Endpoint must be http or https, got '{}'",
                    url.scheme()
                )));
            }
        }
        if c.request_timeout_secs == Some(0) {
            return Err(VqaError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
