//! Progress-callback trait for per-question benchmark events.
//!
//! Inject an [`Arc<dyn BenchmarkProgressCallback>`] via
//! [`crate::config::BenchmarkConfigBuilder::progress_callback`] to receive
//! events as each worker finishes an evaluation. Events arrive in completion
//! order, not question order; the final report is the ordered record.
//!
//! # Example
//!
//! ```rust
//! use pagebench::{BenchmarkConfig, BenchmarkProgressCallback, EvaluationMode};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BenchmarkProgressCallback for CountingCallback {
//!     fn on_evaluation_complete(&self, idx: usize, mode: EvaluationMode, elapsed: Duration) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("question {} {} done in {:.2}s", idx + 1, mode, elapsed.as_secs_f64());
//!     }
//! }
//!
//! let config = BenchmarkConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::EvaluationMode;
use std::sync::Arc;
use std::time::Duration;

/// Called by the runner as questions are evaluated.
///
/// Methods are invoked concurrently from different worker tasks.
/// Implementations must protect shared mutable state with appropriate
/// synchronisation primitives (e.g. `Mutex`, `AtomicUsize`). All methods
/// have default no-op implementations.
///
/// `question_idx` is 0-based and refers to the configured question order.
pub trait BenchmarkProgressCallback: Send + Sync {
    /// Called once before any question is dispatched.
    fn on_run_start(&self, total_questions: usize, total_pages: usize) {
        let _ = (total_questions, total_pages);
    }

    /// Called when a worker picks up a question.
    fn on_question_start(&self, question_idx: usize, total_questions: usize, question: &str) {
        let _ = (question_idx, total_questions, question);
    }

    /// Called when one mode of a question produced an answer.
    fn on_evaluation_complete(&self, question_idx: usize, mode: EvaluationMode, elapsed: Duration) {
        let _ = (question_idx, mode, elapsed);
    }

    /// Called when one mode of a question failed.
    fn on_evaluation_error(&self, question_idx: usize, mode: EvaluationMode, error: &str) {
        let _ = (question_idx, mode, error);
    }

    /// Called once after every question has been collected.
    ///
    /// `failed_evaluations` counts failed (question, mode) pairs.
    fn on_run_complete(&self, total_questions: usize, failed_evaluations: usize) {
        let _ = (total_questions, failed_evaluations);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BenchmarkProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BenchmarkConfig`].
pub type ProgressCallback = Arc<dyn BenchmarkProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(5, 40);
        cb.on_question_start(0, 5, "q");
        cb.on_evaluation_complete(0, EvaluationMode::Text, Duration::from_millis(10));
        cb.on_evaluation_error(0, EvaluationMode::Image, "boom");
        cb.on_run_complete(5, 1);
    }
}
