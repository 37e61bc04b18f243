//! # pagebench
//!
//! Benchmark long-document question answering in two context modes: the raw
//! page text, or the same pages rendered as images and sent to a vision LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text document
//!  │
//!  ├─ 1. Input      read a local file or download from URL
//!  ├─ 2. Normalise  newlines and tabs to spaces, collapse double spaces once
//!  ├─ 3. Paginate   wrap to the page width, cut fixed-height pages
//!  ├─ 4. Render     draw each page onto a 1024×1024 canvas (spawn_blocking)
//!  ├─ 5. Persist    images/page{n}.jpg + pages.json
//!  ├─ 6. Evaluate   per question: text prompt, then image prompt (≤ 5 workers)
//!  └─ 7. Report     results.json, one entry per question, in input order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagebench::{run_benchmark_to_file, BenchmarkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = BenchmarkConfig::builder()
//!         .input("yule.txt")
//!         .font_path("Verdana.ttf")
//!         .pages_per_question(5)
//!         .build()?;
//!     let report = run_benchmark_to_file(&config).await?;
//!     eprintln!(
//!         "{} questions over {} pages, {} failed evaluations",
//!         report.results.len(),
//!         report.total_pages,
//!         report.failed_evaluations()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagebench` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pagebench = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod benchmark;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use benchmark::{
    prepare_document, run_benchmark, run_benchmark_sync, run_benchmark_to_file, run_questions,
};
pub use client::{
    resolve_client, Completion, ContentBlock, ImageDetail, Message, MessageContent, ModelClient,
    ProviderClient, Role,
};
pub use config::{BenchmarkConfig, BenchmarkConfigBuilder, PageGeometry, PageImageFormat};
pub use error::{BenchError, EvalError, ModelError};
pub use output::{
    Answer, BenchmarkReport, EvaluationMode, EvaluationResult, QuestionResult, TokenUsage,
};
pub use pipeline::paginate::{Document, Page};
pub use progress::{BenchmarkProgressCallback, NoopProgressCallback, ProgressCallback};
