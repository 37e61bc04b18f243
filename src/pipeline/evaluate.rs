//! Per-question evaluation in both context modes.
//!
//! ## Message Layout
//!
//! Both modes send three messages, differing only in the second:
//!
//! | # | Text mode | Image mode |
//! |---|-----------|------------|
//! | 1 | system instruction | system instruction |
//! | 2 | first N page texts joined by `\n` | N `image_url` blocks, `detail: high` |
//! | 3 | the question | the question |
//!
//! The page images are encoded once per run, before dispatch, and shared
//! through [`EvaluationContext::image_uris`].
//!
//! Every evaluation returns an [`EvaluationResult`]; failures are recorded,
//! never propagated, and never retried.

use crate::client::{Completion, ContentBlock, ImageDetail, Message, ModelClient};
use crate::config::PageImageFormat;
use crate::error::EvalError;
use crate::output::{Answer, EvaluationMode, EvaluationResult, QuestionResult};
use crate::pipeline::encode::encode_page;
use crate::pipeline::paginate::{Document, Page};
use crate::progress::ProgressCallback;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Read-only state shared by every worker of a run.
pub struct EvaluationContext {
    pub client: Arc<dyn ModelClient>,
    pub document: Arc<Document>,
    /// Pages exposed per question; already clamped to the document length.
    pub pages_per_question: usize,
    pub system_prompt: String,
    /// Data URIs of the first `pages_per_question` pages, or the encoding
    /// failure every image evaluation of the run reports.
    pub image_uris: Result<Vec<String>, EvalError>,
    pub progress: Option<ProgressCallback>,
}

impl EvaluationContext {
    fn context_pages(&self) -> &[Page] {
        self.document.prefix(self.pages_per_question)
    }
}

/// `[system, joined page texts, question]`.
pub fn build_text_messages(system_prompt: &str, context: String, question: &str) -> Vec<Message> {
    vec![
        Message::system(system_prompt),
        Message::user(context),
        Message::user(question),
    ]
}

/// `[system, one image block per page, question]`.
pub fn build_image_messages(
    system_prompt: &str,
    image_uris: Vec<String>,
    question: &str,
) -> Vec<Message> {
    let blocks = image_uris
        .into_iter()
        .map(|uri| ContentBlock::image(uri, ImageDetail::High))
        .collect();
    vec![
        Message::system(system_prompt),
        Message::user_blocks(blocks),
        Message::user(question),
    ]
}

/// Encode pages to data URIs, stopping at the first failure.
pub fn encode_pages(pages: &[Page], format: PageImageFormat) -> Result<Vec<String>, EvalError> {
    pages
        .iter()
        .map(|page| {
            encode_page(page.image(), format).map_err(|e| EvalError::ImageEncoding {
                page: page.number(),
                detail: e.to_string(),
            })
        })
        .collect()
}

/// Ask `question` against the first N page texts.
pub async fn evaluate_text(ctx: &EvaluationContext, idx: usize, question: &str) -> EvaluationResult {
    let start = Instant::now();
    let context = ctx
        .context_pages()
        .iter()
        .map(Page::text)
        .collect::<Vec<_>>()
        .join("\n");
    let messages = build_text_messages(&ctx.system_prompt, context, question);

    let outcome = ctx.client.evaluate(&messages).await.map_err(EvalError::from);
    record(ctx, idx, EvaluationMode::Text, start, None, outcome)
}

/// Ask `question` against the first N page images.
pub async fn evaluate_image(ctx: &EvaluationContext, idx: usize, question: &str) -> EvaluationResult {
    let start = Instant::now();

    let outcome = match &ctx.image_uris {
        Ok(uris) => {
            let messages = build_image_messages(&ctx.system_prompt, uris.clone(), question);
            ctx.client.evaluate(&messages).await.map_err(EvalError::from)
        }
        Err(e) => Err(e.clone()),
    };
    let n_pages = ctx.image_uris.as_ref().map_or(ctx.pages_per_question, Vec::len);
    record(ctx, idx, EvaluationMode::Image, start, Some(n_pages), outcome)
}

/// Run both modes for one question, text first.
pub async fn evaluate_question(
    ctx: &EvaluationContext,
    idx: usize,
    total: usize,
    question: String,
) -> QuestionResult {
    info!("Processing question {}/{}: {}", idx + 1, total, question);
    if let Some(ref cb) = ctx.progress {
        cb.on_question_start(idx, total, &question);
    }

    let text_prompt = evaluate_text(ctx, idx, &question).await;
    let image_prompt = evaluate_image(ctx, idx, &question).await;

    QuestionResult {
        question,
        text_prompt,
        image_prompt,
    }
}

/// A result for a question whose worker never produced one.
pub fn failed_question(question: String, error: &EvalError) -> QuestionResult {
    let msg = error.to_string();
    QuestionResult {
        question,
        text_prompt: EvaluationResult::failed(msg.clone()),
        image_prompt: EvaluationResult::failed(msg),
    }
}

fn record(
    ctx: &EvaluationContext,
    idx: usize,
    mode: EvaluationMode,
    start: Instant,
    n_pages: Option<usize>,
    outcome: Result<Completion, EvalError>,
) -> EvaluationResult {
    let elapsed = start.elapsed();
    match outcome {
        Ok(completion) => {
            let usage = completion.usage;
            info!(
                "Question {}: {} prompt completed in {:.2}s ({} prompt, {} completion, {} total tokens)",
                idx + 1,
                mode,
                elapsed.as_secs_f64(),
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
            if let Some(ref cb) = ctx.progress {
                cb.on_evaluation_complete(idx, mode, elapsed);
            }
            EvaluationResult::Answered(Answer {
                answer: completion.text,
                time_seconds: elapsed.as_secs_f64(),
                n_pages,
                usage,
            })
        }
        Err(e) => {
            let msg = e.to_string();
            warn!("Question {}: {} prompt failed — {}", idx + 1, mode, msg);
            if let Some(ref cb) = ctx.progress {
                cb.on_evaluation_error(idx, mode, &msg);
            }
            EvaluationResult::failed(msg)
        }
    }
}
