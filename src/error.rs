//! Error types for the pagebench library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`BenchError`] — **Fatal**: the run cannot proceed at all (missing
//!   document, unreadable font, output directory not writable, provider not
//!   configured). Returned as `Err(BenchError)` from the top-level `run*`
//!   functions.
//!
//! * [`EvalError`] — **Non-fatal**: a single (question, mode) evaluation
//!   failed. Converted into the `{ "error": ... }` record of
//!   [`crate::output::EvaluationResult`] so the rest of the run continues.
//!
//! * [`ModelError`] — what a [`crate::client::ModelClient`] reports. The
//!   runner never inspects the variant; every model failure is simply an
//!   evaluation failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagebench library.
///
/// Per-evaluation failures use [`EvalError`] and are stored in the report
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum BenchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is empty or otherwise unusable.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The document bytes are not valid UTF-8.
    #[error("Document '{source_name}' is not valid UTF-8: {detail}")]
    NotUtf8 { source_name: String, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Font errors ───────────────────────────────────────────────────────
    /// The font file does not exist.
    #[error("Font not found: '{path}'\nPass --font /path/to/font.ttf")]
    FontNotFound { path: PathBuf },

    /// The font file exists but could not be read or parsed.
    #[error("Failed to load font '{path}': {detail}")]
    FontLoadFailed { path: PathBuf, detail: String },

    /// The font parsed but its metrics cannot drive a layout.
    #[error("Font '{path}' is unusable for layout: {detail}")]
    InvalidFont { path: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the page-image output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a rendered page image.
    #[error("Failed to write page image '{path}': {detail}")]
    ImageWriteFailed { path: PathBuf, detail: String },

    /// Could not create or write a JSON artefact (manifest or report).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON artefact could not be serialised.
    #[error("Failed to serialise '{path}': {source}")]
    ReportSerializeFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or the geometry cannot fit a single line.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single evaluation of one question.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// The model client returned an error.
    #[error("{0}")]
    ModelCall(#[from] ModelError),

    /// A context page could not be encoded as an image.
    #[error("Page {page}: image encoding failed: {detail}")]
    ImageEncoding { page: usize, detail: String },

    /// The worker running this question panicked or was cancelled.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

/// Failure reported by a [`crate::client::ModelClient`].
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The provider API rejected or failed the request.
    #[error("LLM API error: {message}")]
    Api { message: String },

    /// A message could not be translated into the provider's format.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The provider answered with no content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_passes_through_eval_error_display() {
        let e: EvalError = ModelError::Api {
            message: "429 rate limited".into(),
        }
        .into();
        assert_eq!(e.to_string(), "LLM API error: 429 rate limited");
    }

    #[test]
    fn image_encoding_display() {
        let e = EvalError::ImageEncoding {
            page: 3,
            detail: "unsupported".into(),
        };
        assert!(e.to_string().contains("Page 3"));
    }

    #[test]
    fn font_not_found_display() {
        let e = BenchError::FontNotFound {
            path: PathBuf::from("Verdana.ttf"),
        };
        let msg = e.to_string();
        assert!(msg.contains("Verdana.ttf"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = BenchError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
