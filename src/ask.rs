//! One-shot entry points: capture, prepare, ask, done.
//!
//! These wrap a short-lived [`SubmissionController`] for callers that have a
//! single image and a single question, such as the `vqa` binary. Interactive
//! front ends should hold a controller themselves instead.

use crate::config::AskConfig;
use crate::controller::{SubmissionController, SubmitOutcome};
use crate::error::VqaError;
use crate::output::{AskOutput, AskStats};
use crate::pipeline::input::{self, UploadedImage};
use crate::pipeline::prepare::{self, PreparedImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Resolve a path or URL and prepare it, without asking anything.
///
/// Needs no endpoint.
pub async fn prepare_input(
    input_str: impl AsRef<str>,
    config: &AskConfig,
) -> Result<PreparedImage, VqaError> {
    let upload = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    prepare::prepare(upload, &config.prepare_options()).await
}

/// Prepare an input and write the prepared bytes to `output_path`.
///
/// Uses atomic write (temp file in the same directory + rename) so a reader
/// never sees a half-written image.
pub async fn prepare_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AskConfig,
) -> Result<PreparedImage, VqaError> {
    let prepared = prepare_input(input_str, config).await?;
    write_prepared(&prepared, output_path.as_ref()).await?;
    Ok(prepared)
}

/// Atomically write a prepared image to `path`.
pub async fn write_prepared(prepared: &PreparedImage, path: &Path) -> Result<(), VqaError> {
    let path = path.to_path_buf();
    let bytes = prepared.bytes.clone();

    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| VqaError::Internal(format!("Write task panicked: {}", e)))?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VqaError> {
    let write_err = |source: std::io::Error| VqaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote prepared image to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Ask `question` about the image at `input_str` (local path or URL).
///
/// # Returns
/// `Ok(AskOutput)` whenever a request was made, including when it failed:
/// then `answered` is `false` and `answer` holds the fixed error text.
///
/// # Errors
/// Returns `Err(VqaError)` for validation failures (empty question) and
/// fatal capture or preparation errors. No request is made in those cases.
///
/// # Example
/// ```rust,no_run
/// use edgequake_vqa::{ask, AskConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AskConfig::builder()
///     .endpoint("http://localhost:3000/api/ask")
///     .build()?;
/// let output = ask("cat.jpg", "What animal is this?", &config).await?;
/// println!("{}", output.answer);
/// # Ok(())
/// # }
/// ```
pub async fn ask(
    input_str: impl AsRef<str>,
    question: impl Into<String>,
    config: &AskConfig,
) -> Result<AskOutput, VqaError> {
    let question = question.into();
    if question.is_empty() {
        return Err(VqaError::EmptyQuestion);
    }
    let upload = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    ask_upload(upload, question, config).await
}

/// Like [`ask`], for an image that is already in memory.
pub async fn ask_upload(
    upload: UploadedImage,
    question: impl Into<String>,
    config: &AskConfig,
) -> Result<AskOutput, VqaError> {
    let total_start = Instant::now();
    let controller = SubmissionController::from_config(config)?;
    let source_bytes = upload.bytes.len();

    let prepare_start = Instant::now();
    controller.select_image(upload).await?;
    let prepare_duration_ms = prepare_start.elapsed().as_millis() as u64;

    let question = question.into();
    controller.set_question(question.clone());

    let request_start = Instant::now();
    let outcome = controller.submit().await?;
    let request_duration_ms = request_start.elapsed().as_millis() as u64;

    let image = controller
        .prepared_image()
        .ok_or(VqaError::MissingImage)?;

    let (answer, answered) = match outcome {
        SubmitOutcome::Answered(a) => (a, true),
        SubmitOutcome::Failed(a) => (a, false),
        SubmitOutcome::Superseded => {
            return Err(VqaError::Internal(
                "single submit was superseded".to_string(),
            ))
        }
    };

    let stats = AskStats {
        source_bytes,
        prepared_bytes: image.bytes.len(),
        prepare_duration_ms,
        request_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Ask complete: answered={} in {}ms total",
        answered, stats.total_duration_ms
    );

    Ok(AskOutput {
        question,
        answer,
        answered,
        image,
        stats,
    })
}

/// Synchronous wrapper around [`ask`].
///
/// Creates a temporary tokio runtime internally.
pub fn ask_sync(
    input_str: impl AsRef<str>,
    question: impl Into<String>,
    config: &AskConfig,
) -> Result<AskOutput, VqaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| VqaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ask(input_str, question, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::media::MediaType;
    use crate::pipeline::encode::encode_image;
    use crate::pipeline::request::AskBackend;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl AskBackend for EchoBackend {
        async fn ask(&self, image: &PreparedImage, question: &str) -> Result<String, TransportError> {
            Ok(format!("{} {}x{}: {}", image.media_type, image.width, image.height, question))
        }
    }

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])));
        let path = dir.join("photo.png");
        std::fs::write(&path, encode_image(&img, MediaType::Png).unwrap()).unwrap();
        path
    }

    fn echo_config() -> AskConfig {
        AskConfig::builder()
            .backend(Arc::new(EchoBackend))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn ask_prepares_then_submits() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 1200, 1600);

        let output = ask(path.to_str().unwrap(), "what is it?", &echo_config())
            .await
            .unwrap();
        assert!(output.answered);
        assert_eq!(output.answer, "image/png 600x800: what is it?");
        assert_eq!(output.image.dimensions(), (600, 800));
        assert_eq!((output.image.original_width, output.image.original_height), (1200, 1600));
        assert_eq!(output.stats.prepared_bytes, output.image.bytes.len());
    }

    #[tokio::test]
    async fn ask_rejects_empty_question_before_reading_input() {
        let err = ask("/does/not/exist.png", "", &echo_config())
            .await
            .unwrap_err();
        assert!(matches!(err, VqaError::EmptyQuestion));
    }

    #[tokio::test]
    async fn prepare_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), 1600, 1200);
        let out = dir.path().join("nested/out.png");

        let prepared = prepare_to_file(src.to_str().unwrap(), &out, &AskConfig::default())
            .await
            .unwrap();
        let written = std::fs::read(&out).unwrap();
        assert_eq!(written, prepared.bytes);
        assert_eq!(
            image::load_from_memory(&written).unwrap().width(),
            800
        );
    }

    #[test]
    fn ask_sync_runs_its_own_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 500, 500);
        let output = ask_sync(path.to_str().unwrap(), "size?", &echo_config()).unwrap();
        assert_eq!(output.answer, "image/png 500x500: size?");
    }
}
