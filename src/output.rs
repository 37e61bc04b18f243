//! Report types written to `results.json`.
//!
//! The JSON shape is flat and stable so results from different models can be
//! diffed directly:
//!
//! ```json
//! {
//!   "model": "gpt-4.1-mini",
//!   "n_pages_loaded": 5,
//!   "total_pages": 41,
//!   "results": [
//!     {
//!       "question": "…",
//!       "text_prompt":  { "answer": "…", "time_seconds": 2.1, "usage": { … } },
//!       "image_prompt": { "error": "LLM API error: …" }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the document context is presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Page texts concatenated into one user message.
    Text,
    /// Page images as a list of image blocks.
    Image,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::Text => f.write_str("text"),
            EvaluationMode::Image => f.write_str("image"),
        }
    }
}

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Wall-clock time of the evaluation, including request construction.
    pub time_seconds: f64,
    /// Pages supplied; present for image-mode evaluations only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_pages: Option<usize>,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Outcome of one (question, mode) evaluation: an answer or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationResult {
    Answered(Answer),
    Failed { error: String },
}

impl EvaluationResult {
    pub fn failed(error: impl Into<String>) -> Self {
        EvaluationResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, EvaluationResult::Answered(_))
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            EvaluationResult::Answered(a) => Some(a),
            EvaluationResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EvaluationResult::Answered(_) => None,
            EvaluationResult::Failed { error } => Some(error),
        }
    }
}

/// Both evaluations of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    pub text_prompt: EvaluationResult,
    pub image_prompt: EvaluationResult,
}

impl QuestionResult {
    pub fn get(&self, mode: EvaluationMode) -> &EvaluationResult {
        match mode {
            EvaluationMode::Text => &self.text_prompt,
            EvaluationMode::Image => &self.image_prompt,
        }
    }

    /// Number of failed modes (0, 1 or 2).
    pub fn failures(&self) -> usize {
        [&self.text_prompt, &self.image_prompt]
            .iter()
            .filter(|r| !r.is_ok())
            .count()
    }
}

/// Complete record of a benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub model: String,
    /// Pages exposed per question (after clamping to `total_pages`).
    pub n_pages_loaded: usize,
    pub total_pages: usize,
    /// One entry per question, in the order the questions were given.
    pub results: Vec<QuestionResult>,
}

impl BenchmarkReport {
    /// Failed evaluations across all questions and modes.
    pub fn failed_evaluations(&self) -> usize {
        self.results.iter().map(QuestionResult::failures).sum()
    }

    pub fn total_evaluations(&self) -> usize {
        self.results.len() * 2
    }
}
