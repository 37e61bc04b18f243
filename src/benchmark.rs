//! Top-level entry points: prepare the paged document, then fan questions
//! out to a bounded worker pool.
//!
//! ## Run Order
//!
//! 1. Resolve the model client (fails fast before any rendering work).
//! 2. Resolve the input and normalise whitespace.
//! 3. Paginate, render and persist pages (`spawn_blocking`, CPU-bound).
//! 4. Encode the first N page images once (`spawn_blocking`).
//! 5. Dispatch one task per question, at most `max_workers` at a time.
//! 6. Await the task handles in submission order and assemble the report.
//!
//! Only steps 1–3 can fail the run. An encoding failure in step 4 is
//! recorded on every image evaluation instead. Once dispatch starts the run always
//! produces a report, even if every evaluation failed.

use crate::client::resolve_client;
use crate::config::BenchmarkConfig;
use crate::error::{BenchError, EvalError};
use crate::output::{BenchmarkReport, QuestionResult};
use crate::pipeline::evaluate::{
    encode_pages, evaluate_question, failed_question, EvaluationContext,
};
use crate::pipeline::paginate::{paginate, Document};
use crate::pipeline::render::PageFont;
use crate::pipeline::{input, normalize, persist};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Paginate the configured input and write the page images and manifest.
///
/// Does not require a model client or API key.
pub async fn prepare_document(config: &BenchmarkConfig) -> Result<Document, BenchError> {
    info!("Loading document: {}", config.input);
    let raw = input::resolve_input(&config.input, config.download_timeout_secs).await?;
    let text = normalize::normalize_whitespace(&raw);
    debug!(
        "Normalised {} chars into {} chars",
        raw.chars().count(),
        text.chars().count()
    );

    let font_path = config.font_path.clone();
    let font_size = config.font_size;
    let geometry = config.geometry;
    let format = config.image_format;
    let image_dir = config.image_dir.clone();
    let manifest_path = config.manifest_path.clone();

    // Font parsing, rasterisation and image files are all blocking work.
    tokio::task::spawn_blocking(move || -> Result<Document, BenchError> {
        let font = PageFont::load(&font_path, font_size)?;
        let document = paginate(&text, &geometry, &font)?;
        persist::persist_pages(document.pages(), &image_dir, format)?;
        persist::write_page_manifest(&document, &manifest_path)?;
        Ok(document)
    })
    .await
    .map_err(|e| BenchError::Internal(format!("Pagination task panicked: {e}")))?
}

/// Run the benchmark and return the report.
///
/// # Errors
/// Returns `Err(BenchError)` only for fatal errors: unreadable input, a font
/// that cannot be loaded, unwritable artefacts, or no configured provider.
/// Failed evaluations are recorded in the report instead.
pub async fn run_benchmark(config: &BenchmarkConfig) -> Result<BenchmarkReport, BenchError> {
    let total_start = Instant::now();

    let client = resolve_client(config)?;
    let model = client.model_id().to_string();
    info!("Using model {}", model);

    let document = Arc::new(prepare_document(config).await?);
    let total_pages = document.len();
    let pages_per_question = effective_prefix(config.pages_per_question, total_pages);

    let image_uris = {
        let document = Arc::clone(&document);
        let format = config.image_format;
        tokio::task::spawn_blocking(move || {
            encode_pages(document.prefix(pages_per_question), format)
        })
        .await
        .map_err(|e| BenchError::Internal(format!("Encoding task panicked: {e}")))?
    };
    match image_uris {
        Ok(ref uris) => debug!(
            "Encoded {} context pages as {}",
            uris.len(),
            config.image_format.mime_type()
        ),
        Err(ref e) => warn!("Image context unavailable: {}", e),
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(config.questions.len(), total_pages);
    }

    let ctx = Arc::new(EvaluationContext {
        client,
        document,
        pages_per_question,
        system_prompt: config.system_prompt.clone(),
        image_uris,
        progress: config.progress_callback.clone(),
    });

    let results = run_questions(ctx, &config.questions, config.max_workers).await;

    let report = BenchmarkReport {
        model,
        n_pages_loaded: pages_per_question,
        total_pages,
        results,
    };

    let failed = report.failed_evaluations();
    info!(
        "Benchmark complete: {} questions, {}/{} evaluations failed, {:.1}s total",
        report.results.len(),
        failed,
        report.total_evaluations(),
        total_start.elapsed().as_secs_f64()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(report.results.len(), failed);
    }

    Ok(report)
}

/// Run the benchmark and write the report to `config.report_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn run_benchmark_to_file(
    config: &BenchmarkConfig,
) -> Result<BenchmarkReport, BenchError> {
    let report = run_benchmark(config).await?;
    persist::write_json_atomic(&report, &config.report_path, 2)?;
    info!("Report written to {}", config.report_path.display());
    Ok(report)
}

/// Synchronous wrapper around [`run_benchmark_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_benchmark_sync(config: &BenchmarkConfig) -> Result<BenchmarkReport, BenchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BenchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_benchmark_to_file(config))
}

/// Evaluate every question with at most `max_workers` questions in flight.
///
/// Returns one result per question, in the order given. A task that panics
/// yields a result with both modes set to the worker failure.
pub async fn run_questions(
    ctx: Arc<EvaluationContext>,
    questions: &[String],
    max_workers: usize,
) -> Vec<QuestionResult> {
    let total = questions.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = max_workers.clamp(1, total);
    debug!("Dispatching {} questions to {} workers", total, workers);
    let semaphore = Arc::new(Semaphore::new(workers));

    let mut handles: Vec<(String, Result<JoinHandle<QuestionResult>, String>)> =
        Vec::with_capacity(total);
    for (idx, question) in questions.iter().enumerate() {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push((question.clone(), Err(e.to_string())));
                continue;
            }
        };
        let ctx = Arc::clone(&ctx);
        let q = question.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            evaluate_question(&ctx, idx, total, q).await
        });
        handles.push((question.clone(), Ok(handle)));
    }

    // Await in submission order, not completion order.
    let mut results = Vec::with_capacity(total);
    for (idx, (question, handle)) in handles.into_iter().enumerate() {
        let outcome = match handle {
            Ok(handle) => handle.await.map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        let result = outcome.unwrap_or_else(|detail| {
            warn!("Question {}: worker failed — {}", idx + 1, detail);
            failed_question(question, &EvalError::WorkerFailed(detail))
        });
        results.push(result);
    }
    results
}

/// Pages exposed per question: `requested`, capped at the document length.
pub fn effective_prefix(requested: usize, total_pages: usize) -> usize {
    if requested > total_pages {
        warn!(
            "Requested {} pages per question but the document has {}; using {}",
            requested, total_pages, total_pages
        );
        total_pages
    } else {
        requested
    }
}
