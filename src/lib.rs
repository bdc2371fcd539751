//! # edgequake-vqa
//!
//! Ask questions about images: downsize the image on the client, then send it
//! with the question to a visual-question-answering endpoint and show the
//! answer.
//!
//! ## Why downsize on the client?
//!
//! Phone photos are 12–50 megapixels and several megabytes. Vision models
//! rarely look at more than ~1 000 px per side, so shipping the full image
//! only costs upload time. Bounding the image to 800×800 (aspect ratio kept,
//! never upscaled) and re-encoding it in its own format cuts the upload by an
//! order of magnitude without changing what the model sees.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image path / URL / drop payload
//!  │
//!  ├─ 1. Capture   read the file or download the URL → UploadedImage
//!  ├─ 2. Prepare   decode → bound to 800×800 → re-encode (same media type)
//!  ├─ 3. Submit    multipart POST {image, question} → /api/ask
//!  └─ 4. Answer    { "description": … } or a fixed error string
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_vqa::{ask, AskConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AskConfig::default(); // http://localhost:3000/api/ask
//!     let output = ask("cat.jpg", "What is the cat doing?", &config).await?;
//!     println!("{}", output.answer);
//!     eprintln!("uploaded {}x{} ({} bytes)",
//!         output.image.width,
//!         output.image.height,
//!         output.stats.prepared_bytes);
//!     Ok(())
//! }
//! ```
//!
//! Interactive front ends hold a [`SubmissionController`] instead and drive
//! it through its named operations; see [`controller`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vqa` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-vqa = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ask;
pub mod config;
pub mod controller;
pub mod error;
pub mod media;
pub mod observer;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ask::{ask, ask_sync, ask_upload, prepare_input, prepare_to_file, write_prepared};
pub use config::{AskConfig, AskConfigBuilder, PrepareOptions, ResizeFilter};
pub use controller::{
    SelectOutcome, SessionSnapshot, SubmissionController, SubmitOutcome, SubmitTicket,
};
pub use error::{TransportError, VqaError};
pub use media::MediaType;
pub use observer::{NoopObserver, ObserverHandle, SessionObserver};
pub use output::{AskOutput, AskStats};
pub use pipeline::input::UploadedImage;
pub use pipeline::prepare::{compute_target_dimensions, prepare, PreparedImage};
pub use pipeline::request::{AskBackend, AskResponse, HttpAskBackend};
