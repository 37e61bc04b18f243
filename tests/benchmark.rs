//! Integration tests for the benchmark runner.
//!
//! A scripted [`ModelClient`] stands in for the provider so ordering,
//! isolation and concurrency can be checked deterministically. Timing tests
//! run on a paused tokio clock, so simulated one-second calls cost nothing.
//!
//! Tests that render real pages need a TrueType font. They probe common
//! system locations (or `PAGEBENCH_TEST_FONT`) and skip when none is found.
//!
//! The live test at the bottom is gated behind `E2E_ENABLED`:
//!   E2E_ENABLED=1 cargo test --test benchmark live -- --nocapture

use async_trait::async_trait;
use image::RgbImage;
use pagebench::pipeline::evaluate::{encode_pages, EvaluationContext};
use pagebench::pipeline::paginate::{compute_layout, FontMetrics};
use pagebench::{
    run_benchmark, run_benchmark_to_file, run_questions, BenchError, BenchmarkConfig,
    BenchmarkProgressCallback, BenchmarkReport, Completion, Document, EvaluationMode, Message,
    MessageContent, ModelClient, ModelError, PageGeometry, PageImageFormat, TokenUsage,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG` overrides the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// How the scripted client treats one (question, mode) pair.
#[derive(Clone, Copy)]
enum Script {
    Answer(Duration),
    Fail,
    Panic,
}

/// Answers with `"<mode>:<question>"` after a per-question delay.
struct ScriptedClient {
    delays: HashMap<String, Duration>,
    overrides: HashMap<(String, EvaluationMode), Script>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(default_delay: Duration) -> Self {
        Self {
            delays: HashMap::new(),
            overrides: HashMap::new(),
            default_delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    fn delay(mut self, question: &str, delay: Duration) -> Self {
        self.delays.insert(question.to_string(), delay);
        self
    }

    fn script(mut self, question: &str, mode: EvaluationMode, script: Script) -> Self {
        self.overrides.insert((question.to_string(), mode), script);
        self
    }

    fn describe(messages: &[Message]) -> (String, EvaluationMode) {
        let question = messages
            .last()
            .and_then(Message::text)
            .unwrap_or_default()
            .to_string();
        let mode = match messages.get(1).map(|m| &m.content) {
            Some(MessageContent::Blocks(_)) => EvaluationMode::Image,
            _ => EvaluationMode::Text,
        };
        (question, mode)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn evaluate(&self, messages: &[Message]) -> Result<Completion, ModelError> {
        let (question, mode) = Self::describe(messages);
        let base = *self.delays.get(&question).unwrap_or(&self.default_delay);
        let script = self
            .overrides
            .get(&(question.clone(), mode))
            .copied()
            .unwrap_or(Script::Answer(base));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let outcome = match script {
            Script::Answer(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Completion {
                    text: format!("{mode}:{question}"),
                    usage: TokenUsage::new(100, 5),
                })
            }
            Script::Fail => Err(ModelError::Api {
                message: "simulated outage".into(),
            }),
            Script::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("scripted panic for {question}");
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed
            .lock()
            .unwrap()
            .push(format!("{mode}:{question}"));
        outcome
    }
}

/// A small in-memory document with blank page images; no font needed.
fn blank_document(pages: usize) -> Document {
    let metrics = FontMetrics {
        advance_width: 100.0,
        reference_height: 9.0,
    };
    let geometry = PageGeometry::default();
    // 10 chars per line and 66 lines per page: one "word" per line.
    let text = "abcdefghi ".repeat(66 * pages);
    let layout = compute_layout(&text, &geometry, &metrics).unwrap();
    assert_eq!(layout.page_count(), pages);
    Document::from_layout(&layout, |_| RgbImage::new(16, 16))
}

fn context(client: Arc<ScriptedClient>, pages: usize, n: usize) -> Arc<EvaluationContext> {
    init_tracing();
    let document = Arc::new(blank_document(pages));
    let image_uris = encode_pages(document.prefix(n), PageImageFormat::Jpeg);
    Arc::new(EvaluationContext {
        client,
        document,
        pages_per_question: n,
        system_prompt: "Answer from the document.".into(),
        image_uris,
        progress: None,
    })
}

fn questions(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("q{i}")).collect()
}

fn find_test_font() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(p) = std::env::var("PAGEBENCH_TEST_FONT") {
        candidates.push(PathBuf::from(p));
    }
    candidates.extend(
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/Library/Fonts/Verdana.ttf",
            "/System/Library/Fonts/Supplemental/Verdana.ttf",
        ]
        .iter()
        .map(PathBuf::from),
    );
    candidates.into_iter().find(|p| p.exists())
}

/// Skip this test if no TrueType font is available.
macro_rules! skip_unless_font {
    () => {{
        match find_test_font() {
            Some(p) => p,
            None => {
                println!("SKIP — no TrueType font found; set PAGEBENCH_TEST_FONT");
                return;
            }
        }
    }};
}

fn config_in(dir: &Path, input: &Path, font: &Path, client: Arc<dyn ModelClient>) -> BenchmarkConfig {
    init_tracing();
    BenchmarkConfig::builder()
        .input(input.to_string_lossy())
        .font_path(font)
        .image_dir(dir.join("images"))
        .manifest_path(dir.join("pages.json"))
        .report_path(dir.join("results.json"))
        .questions(["Who is the narrator?", "Where does the story end?"])
        .client(client)
        .build()
        .unwrap()
}

// ── Runner: ordering, isolation, concurrency ─────────────────────────────────

#[tokio::test(start_paused = true)]
async fn results_follow_submission_order_not_completion_order() {
    // Later questions finish first.
    let client = Arc::new(
        ScriptedClient::new(Duration::from_millis(10))
            .delay("q1", Duration::from_millis(500))
            .delay("q2", Duration::from_millis(400))
            .delay("q3", Duration::from_millis(300))
            .delay("q4", Duration::from_millis(200))
            .delay("q5", Duration::from_millis(100)),
    );
    let qs = questions(5);
    let results = run_questions(context(client.clone(), 3, 3), &qs, 5).await;

    assert_eq!(results.len(), qs.len());
    for (result, question) in results.iter().zip(&qs) {
        assert_eq!(&result.question, question);
        assert_eq!(
            result.text_prompt.answer().unwrap().answer,
            format!("text:{question}")
        );
        assert_eq!(
            result.image_prompt.answer().unwrap().answer,
            format!("image:{question}")
        );
    }

    let completed = client.completed.lock().unwrap();
    assert_eq!(completed.first().map(String::as_str), Some("text:q5"));
}

#[tokio::test(start_paused = true)]
async fn image_failure_is_isolated_to_its_record() {
    let client = Arc::new(
        ScriptedClient::new(Duration::from_millis(50)).script(
            "q2",
            EvaluationMode::Image,
            Script::Fail,
        ),
    );
    let qs = questions(3);
    let results = run_questions(context(client, 2, 2), &qs, 5).await;

    assert_eq!(results.len(), 3);
    assert!(results[1].text_prompt.is_ok());
    assert_eq!(
        results[1].image_prompt.error(),
        Some("LLM API error: simulated outage")
    );
    for other in [&results[0], &results[2]] {
        assert_eq!(other.failures(), 0);
        assert_eq!(other.image_prompt.answer().unwrap().n_pages, Some(2));
    }
}

#[tokio::test(start_paused = true)]
async fn worker_panic_fails_both_modes_of_that_question_only() {
    let client = Arc::new(
        ScriptedClient::new(Duration::from_millis(50)).script(
            "q1",
            EvaluationMode::Text,
            Script::Panic,
        ),
    );
    let qs = questions(2);
    let results = run_questions(context(client, 1, 1), &qs, 2).await;

    assert_eq!(results[0].question, "q1");
    assert_eq!(results[0].failures(), 2);
    assert!(results[0]
        .text_prompt
        .error()
        .unwrap()
        .starts_with("Worker failed"));
    assert_eq!(results[1].failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn questions_run_in_parallel_and_modes_run_sequentially() {
    let client = Arc::new(ScriptedClient::new(Duration::from_secs(1)));
    let qs = questions(5);

    let start = tokio::time::Instant::now();
    let results = run_questions(context(client.clone(), 5, 5), &qs, 5).await;
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 5);
    assert!(
        elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100),
        "expected ~2s, got {elapsed:?}"
    );
    assert_eq!(client.peak.load(Ordering::SeqCst), 5);
    for r in &results {
        let text = r.text_prompt.answer().unwrap();
        assert!((text.time_seconds - 1.0).abs() < 0.05);
    }
}

#[tokio::test(start_paused = true)]
async fn worker_cap_bounds_in_flight_questions() {
    let client = Arc::new(ScriptedClient::new(Duration::from_secs(1)));
    let qs = questions(7);

    let start = tokio::time::Instant::now();
    let results = run_questions(context(client.clone(), 5, 5), &qs, 5).await;
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 7);
    assert_eq!(client.peak.load(Ordering::SeqCst), 5);
    assert!(
        elapsed >= Duration::from_secs(4) && elapsed < Duration::from_millis(4100),
        "expected ~4s, got {elapsed:?}"
    );
}

#[tokio::test]
async fn empty_question_list_yields_no_results() {
    let client = Arc::new(ScriptedClient::new(Duration::ZERO));
    let results = run_questions(context(client.clone(), 1, 1), &[], 5).await;
    assert!(results.is_empty());
    assert!(client.completed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn text_context_is_the_first_n_pages_joined_by_newline() {
    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        fn model_id(&self) -> &str {
            "echo"
        }
        async fn evaluate(&self, messages: &[Message]) -> Result<Completion, ModelError> {
            let body = match &messages[1].content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::Blocks(b) => format!("{} images", b.len()),
            };
            Ok(Completion {
                text: body,
                usage: TokenUsage::default(),
            })
        }
    }

    let document = blank_document(4);
    let expected = document
        .prefix(2)
        .iter()
        .map(|p| p.text().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let image_uris = encode_pages(document.prefix(2), PageImageFormat::Png);
    let ctx = Arc::new(EvaluationContext {
        client: Arc::new(Echo),
        document: Arc::new(document),
        pages_per_question: 2,
        system_prompt: "sys".into(),
        image_uris,
        progress: None,
    });

    let results = run_questions(ctx, &questions(1), 5).await;
    assert_eq!(results[0].text_prompt.answer().unwrap().answer, expected);
    assert_eq!(results[0].image_prompt.answer().unwrap().answer, "2 images");
}

// ── run_benchmark: fatal errors ──────────────────────────────────────────────

#[tokio::test]
async fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new(Duration::ZERO));
    let config = config_in(
        dir.path(),
        &dir.path().join("absent.txt"),
        Path::new("font.ttf"),
        client,
    );
    let err = run_benchmark(&config).await.unwrap_err();
    assert!(matches!(err, BenchError::FileNotFound { .. }), "{err}");
}

#[tokio::test]
async fn missing_font_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.txt");
    std::fs::write(&input, "Hello world. ".repeat(100)).unwrap();
    let client = Arc::new(ScriptedClient::new(Duration::ZERO));
    let config = config_in(dir.path(), &input, &dir.path().join("nope.ttf"), client);

    let err = run_benchmark(&config).await.unwrap_err();
    assert!(matches!(err, BenchError::FontNotFound { .. }), "{err}");
    assert!(!dir.path().join("results.json").exists());
}

// ── run_benchmark: full pipeline with a real font ────────────────────────────

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    finished: AtomicUsize,
}

impl BenchmarkProgressCallback for CountingCallback {
    fn on_question_start(&self, _idx: usize, _total: usize, _question: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_evaluation_complete(&self, _idx: usize, _mode: EvaluationMode, _elapsed: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_evaluation_error(&self, _idx: usize, _mode: EvaluationMode, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _total: usize, _failed: usize) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn full_run_writes_artifacts_and_report() {
    let font = skip_unless_font!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.txt");
    std::fs::write(&input, "Hello world.\n\tThe end is near. ".repeat(2000)).unwrap();

    let client = Arc::new(
        ScriptedClient::new(Duration::from_millis(5)).script(
            "Where does the story end?",
            EvaluationMode::Image,
            Script::Fail,
        ),
    );
    let progress = Arc::new(CountingCallback::default());
    let mut config = config_in(dir.path(), &input, &font, client);
    config.progress_callback = Some(progress.clone());

    let report = run_benchmark_to_file(&config).await.unwrap();

    assert_eq!(report.model, "scripted-model");
    assert!(report.total_pages > 1);
    assert_eq!(report.n_pages_loaded, 5.min(report.total_pages));
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].question, "Who is the narrator?");
    assert_eq!(report.failed_evaluations(), 1);

    assert_eq!(progress.started.load(Ordering::SeqCst), 2);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 3);
    assert_eq!(progress.errors.load(Ordering::SeqCst), 1);
    assert_eq!(progress.finished.load(Ordering::SeqCst), 1);

    // One image per page, numbered from 1.
    for n in 1..=report.total_pages {
        assert!(dir.path().join(format!("images/page{n}.jpg")).exists());
    }
    assert!(!dir
        .path()
        .join(format!("images/page{}.jpg", report.total_pages + 1))
        .exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("pages.json")).unwrap())
            .unwrap();
    assert_eq!(
        manifest.as_object().unwrap().len(),
        report.total_pages,
        "manifest has one entry per page"
    );
    assert!(manifest["1"].as_u64().unwrap() > 0);

    let written: BenchmarkReport =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("results.json")).unwrap())
            .unwrap();
    assert_eq!(written.results.len(), 2);
    assert_eq!(
        written.results[1].image_prompt.error(),
        Some("LLM API error: simulated outage")
    );
}

#[tokio::test]
async fn pages_per_question_is_clamped_to_page_count() {
    let font = skip_unless_font!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("short.txt");
    std::fs::write(&input, "Only a few words on one page.").unwrap();

    let client = Arc::new(ScriptedClient::new(Duration::ZERO));
    let mut config = config_in(dir.path(), &input, &font, client);
    config.pages_per_question = 50;

    let report = run_benchmark(&config).await.unwrap();
    assert_eq!(report.total_pages, 1);
    assert_eq!(report.n_pages_loaded, 1);
    assert_eq!(
        report.results[0].image_prompt.answer().unwrap().n_pages,
        Some(1)
    );
}

// ── Live model (E2E) ─────────────────────────────────────────────────────────

#[tokio::test]
async fn live_single_question_against_real_provider() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let font = skip_unless_font!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("story.txt");
    std::fs::write(
        &input,
        "The lighthouse keeper, Mara, kept a log of every ship. ".repeat(400),
    )
    .unwrap();

    let config = BenchmarkConfig::builder()
        .input(input.to_string_lossy())
        .font_path(&font)
        .image_dir(dir.path().join("images"))
        .manifest_path(dir.path().join("pages.json"))
        .report_path(dir.path().join("results.json"))
        .pages_per_question(1)
        .questions(["What is the lighthouse keeper's name?"])
        .build()
        .unwrap();

    let report = run_benchmark_to_file(&config).await.expect("run succeeds");
    let result = &report.results[0];
    println!("{}", serde_json::to_string_pretty(result).unwrap());
    let text = result.text_prompt.answer().expect("text answer");
    assert!(text.answer.contains("Mara"));
    assert!(text.usage.total_tokens > 0);
}
