//! The submission controller: one image, one question, one answer.
//!
//! All session state lives in a [`SessionState`] owned by the controller and
//! changes only through named operations ([`SubmissionController::set_image`],
//! [`SubmissionController::set_question`], [`SubmissionController::begin_submit`],
//! [`SubmissionController::complete_submit`]). Whatever renders the session
//! reads a [`SessionSnapshot`] or listens through a
//! [`crate::observer::SessionObserver`].
//!
//! ## Overlapping work
//!
//! Neither image selection nor submission is exclusive. Each takes a fresh
//! *generation*; a result that arrives after a newer one was started is
//! discarded, so a slow stale response can never overwrite a newer answer and
//! a slow stale preparation can never replace a newer image.
//!
//! The state mutex is only held for plain field updates, never across an
//! `.await` and never while calling the observer.

use crate::config::{AskConfig, PrepareOptions};
use crate::error::{TransportError, VqaError};
use crate::observer::{NoopObserver, SessionObserver};
use crate::pipeline::input::UploadedImage;
use crate::pipeline::prepare::{prepare, PreparedImage};
use crate::pipeline::request::{AskBackend, HttpAskBackend};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SessionState {
    image: Option<PreparedImage>,
    preview: Option<String>,
    question: String,
    loading: bool,
    answer: Option<String>,
    /// Issued to every selection when it starts.
    image_generation: u64,
    /// Generation of the image currently stored.
    stored_image_generation: u64,
    submit_generation: u64,
}

/// A point-in-time copy of the session, for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub image: Option<PreparedImage>,
    /// `data:` URI of the prepared image.
    #[serde(skip)]
    pub preview: Option<String>,
    pub question: String,
    pub loading: bool,
    pub answer: Option<String>,
}

/// Result of [`SubmissionController::select_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The prepared image is now the session image.
    Stored,
    /// A newer selection started while this one was preparing; it was dropped.
    Superseded,
}

/// Everything one in-flight submit needs, captured at submit time.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub generation: u64,
    pub image: PreparedImage,
    pub question: String,
}

/// How a submit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The endpoint answered; the text is now the displayed answer.
    Answered(String),
    /// The request failed; the fixed error answer is now displayed.
    Failed(String),
    /// A newer submit started meanwhile; this result was discarded.
    Superseded,
}

impl SubmitOutcome {
    /// The text that was displayed, if this submit won.
    pub fn answer(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Answered(a) | SubmitOutcome::Failed(a) => Some(a),
            SubmitOutcome::Superseded => None,
        }
    }
}

/// Orchestrates capture, preparation and submission for one session.
pub struct SubmissionController {
    backend: Arc<dyn AskBackend>,
    observer: Arc<dyn SessionObserver>,
    options: PrepareOptions,
    error_answer: String,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionController")
            .field("options", &self.options)
            .field("error_answer", &self.error_answer)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl SubmissionController {
    /// Create a controller around an explicit backend.
    pub fn new(backend: Arc<dyn AskBackend>, config: &AskConfig) -> Self {
        Self {
            backend,
            observer: config
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver)),
            options: config.prepare_options(),
            error_answer: config.error_answer.clone(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Create a controller, using `config.backend` if set, otherwise an
    /// [`HttpAskBackend`] for `config.endpoint`.
    pub fn from_config(config: &AskConfig) -> Result<Self, VqaError> {
        let backend: Arc<dyn AskBackend> = match config.backend {
            Some(ref backend) => Arc::clone(backend),
            None => Arc::new(HttpAskBackend::new(config)?),
        };
        Ok(Self::new(backend, config))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Capture ──────────────────────────────────────────────────────────

    /// File-picker entry point: prepare `upload` and make it the session image.
    ///
    /// A preparation is discarded only if a newer selection has already
    /// stored its image. A newer selection that fails leaves older ones free
    /// to complete.
    pub async fn select_image(&self, upload: UploadedImage) -> Result<SelectOutcome, VqaError> {
        let generation = {
            let mut state = self.lock();
            state.image_generation += 1;
            state.image_generation
        };

        let file_name = upload.file_name.clone();
        let prepared = prepare(upload, &self.options).await?;
        let preview = prepared.preview_uri();

        {
            let mut state = self.lock();
            if state.stored_image_generation > generation {
                debug!(
                    "Discarding stale preparation of {} (generation {} < {})",
                    file_name, generation, state.stored_image_generation
                );
                return Ok(SelectOutcome::Superseded);
            }
            state.stored_image_generation = generation;
            state.image = Some(prepared.clone());
            state.preview = Some(preview.clone());
        }

        self.observer.on_image_prepared(&prepared, &preview);
        Ok(SelectOutcome::Stored)
    }

    /// Drop entry point: only the first file of the payload is used.
    pub async fn select_first(
        &self,
        files: impl IntoIterator<Item = UploadedImage>,
    ) -> Result<SelectOutcome, VqaError> {
        let mut files = files.into_iter();
        let first = files.next().ok_or(VqaError::EmptyDropPayload)?;
        let ignored = files.count();
        if ignored > 0 {
            debug!("Drop payload: using {}, ignoring {} more", first.file_name, ignored);
        }
        self.select_image(first).await
    }

    /// Make an already-prepared image the session image.
    ///
    /// Supersedes any selection still being prepared.
    pub fn set_image(&self, prepared: PreparedImage) {
        let preview = prepared.preview_uri();
        {
            let mut state = self.lock();
            state.image_generation += 1;
            state.stored_image_generation = state.image_generation;
            state.image = Some(prepared.clone());
            state.preview = Some(preview.clone());
        }
        self.observer.on_image_prepared(&prepared, &preview);
    }

    /// Replace the pending question.
    pub fn set_question(&self, question: impl Into<String>) {
        self.lock().question = question.into();
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Validate and enter the loading state.
    ///
    /// On a validation failure nothing changes and no ticket is issued.
    pub fn begin_submit(&self) -> Result<SubmitTicket, VqaError> {
        let result = {
            let mut state = self.lock();
            match state.image.clone() {
                None => Err(VqaError::MissingImage),
                Some(_) if state.question.is_empty() => Err(VqaError::EmptyQuestion),
                Some(image) => {
                    state.submit_generation += 1;
                    state.loading = true;
                    Ok(SubmitTicket {
                        generation: state.submit_generation,
                        image,
                        question: state.question.clone(),
                    })
                }
            }
        };

        match result {
            Ok(ref ticket) => {
                debug!("Submit generation {} started", ticket.generation);
                self.observer.on_loading_changed(true);
            }
            Err(ref e) => {
                info!("Submit rejected: {}", e);
                self.observer.on_validation_failed(e);
            }
        }
        result
    }

    /// Record the result of the request started with ticket `generation`.
    ///
    /// A failure is replaced by the fixed error answer. Only the newest
    /// submit may write the answer and leave the loading state.
    pub fn complete_submit(
        &self,
        generation: u64,
        outcome: Result<String, TransportError>,
    ) -> SubmitOutcome {
        let (answer, error) = match outcome {
            Ok(answer) => (answer, None),
            Err(e) => {
                warn!("Request for submit generation {} failed: {}", generation, e);
                (self.error_answer.clone(), Some(e))
            }
        };

        {
            let mut state = self.lock();
            if state.submit_generation != generation {
                debug!(
                    "Discarding stale answer (generation {} < {})",
                    generation, state.submit_generation
                );
                return SubmitOutcome::Superseded;
            }
            state.answer = Some(answer.clone());
            state.loading = false;
        }

        if let Some(ref e) = error {
            self.observer.on_transport_error(e);
        }
        self.observer.on_answer(&answer);
        self.observer.on_loading_changed(false);

        match error {
            None => SubmitOutcome::Answered(answer),
            Some(_) => SubmitOutcome::Failed(answer),
        }
    }

    /// Leave the loading state for a submit that will never complete
    /// (its future was dropped), if it is still the newest.
    fn abandon_submit(&self, generation: u64) {
        let cleared = {
            let mut state = self.lock();
            if state.submit_generation == generation && state.loading {
                state.loading = false;
                true
            } else {
                false
            }
        };
        if cleared {
            debug!("Submit generation {} abandoned", generation);
            self.observer.on_loading_changed(false);
        }
    }

    /// Validate, send one request, and record the answer.
    ///
    /// `Err` is returned only for validation failures; transport failures
    /// become [`SubmitOutcome::Failed`] with the fixed error answer.
    pub async fn submit(&self) -> Result<SubmitOutcome, VqaError> {
        let ticket = self.begin_submit()?;
        let mut pending = PendingSubmit {
            controller: self,
            generation: ticket.generation,
            settled: false,
        };

        let outcome = self.backend.ask(&ticket.image, &ticket.question).await;

        pending.settled = true;
        Ok(self.complete_submit(ticket.generation, outcome))
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            image: state.image.clone(),
            preview: state.preview.clone(),
            question: state.question.clone(),
            loading: state.loading,
            answer: state.answer.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn answer(&self) -> Option<String> {
        self.lock().answer.clone()
    }

    pub fn question(&self) -> String {
        self.lock().question.clone()
    }

    pub fn prepared_image(&self) -> Option<PreparedImage> {
        self.lock().image.clone()
    }
}

/// Clears the loading flag if a submit future is dropped mid-request.
struct PendingSubmit<'a> {
    controller: &'a SubmissionController,
    generation: u64,
    settled: bool,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.controller.abandon_submit(self.generation);
        }
    }
}
