//! Observer trait for session events: the rendering hook.
//!
//! The controller owns the state; whatever displays it (a terminal spinner,
//! a web view, a test) implements [`SessionObserver`] and is told when the
//! preview, the loading flag, or the answer changes. Inject one via
//! [`crate::config::AskConfigBuilder::observer`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_vqa::{AskConfig, SessionObserver};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct LastAnswer(Mutex<Option<String>>);
//!
//! impl SessionObserver for LastAnswer {
//!     fn on_answer(&self, answer: &str) {
//!         *self.0.lock().unwrap() = Some(answer.to_string());
//!     }
//! }
//!
//! let config = AskConfig::builder()
//!     .observer(Arc::new(LastAnswer::default()) as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{TransportError, VqaError};
use crate::pipeline::prepare::PreparedImage;
use std::sync::Arc;

/// Called by the [`crate::controller::SubmissionController`] as state changes.
///
/// Implementations must be `Send + Sync`: submits may overlap, so callbacks
/// can arrive from different tasks. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// A new prepared image was stored; `preview` is its `data:` URI.
    fn on_image_prepared(&self, image: &PreparedImage, preview: &str) {
        let _ = (image, preview);
    }

    /// A submit precondition failed; `error` is user-facing.
    fn on_validation_failed(&self, error: &VqaError) {
        let _ = error;
    }

    /// The loading flag flipped.
    fn on_loading_changed(&self, loading: bool) {
        let _ = loading;
    }

    /// The request failed; the fixed error answer follows via [`Self::on_answer`].
    fn on_transport_error(&self, error: &TransportError) {
        let _ = error;
    }

    /// The displayed answer changed.
    fn on_answer(&self, answer: &str) {
        let _ = answer;
    }
}

/// Default observer: ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::AskConfig`].
pub type ObserverHandle = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        loading_on: AtomicUsize,
        loading_off: AtomicUsize,
        answers: AtomicUsize,
    }

    impl SessionObserver for CountingObserver {
        fn on_loading_changed(&self, loading: bool) {
            if loading {
                self.loading_on.fetch_add(1, Ordering::SeqCst);
            } else {
                self.loading_off.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_answer(&self, _answer: &str) {
            self.answers.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_loading_changed(true);
        obs.on_validation_failed(&VqaError::EmptyQuestion);
        obs.on_transport_error(&TransportError::MalformedResponse {
            detail: "eof".into(),
        });
        obs.on_answer("a cat");
    }

    #[test]
    fn arc_dyn_observer_receives_events() {
        let counter = Arc::new(CountingObserver::default());
        let handle: ObserverHandle = counter.clone();
        handle.on_loading_changed(true);
        handle.on_answer("a cat");
        handle.on_loading_changed(false);

        assert_eq!(counter.loading_on.load(Ordering::SeqCst), 1);
        assert_eq!(counter.loading_off.load(Ordering::SeqCst), 1);
        assert_eq!(counter.answers.load(Ordering::SeqCst), 1);
    }
}
