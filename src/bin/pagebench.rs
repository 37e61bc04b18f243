//! CLI binary for pagebench.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BenchmarkConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagebench::prompts::parse_questions;
use pagebench::{
    prepare_document, run_benchmark_to_file, BenchmarkConfig, BenchmarkProgressCallback,
    BenchmarkReport, EvaluationMode, PageGeometry, PageImageFormat, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over every (question, mode) pair,
/// with a log line per finished evaluation. Evaluations finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many evaluations to expect.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Paginating document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total_evaluations: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} evaluations  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_evaluations as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Evaluating");
        self.bar.reset_eta();
    }
}

impl BenchmarkProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_questions: usize, total_pages: usize) {
        self.activate_bar(total_questions * 2);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Asking {total_questions} questions over {total_pages} pages…"
            ))
        ));
    }

    fn on_question_start(&self, question_idx: usize, _total: usize, _question: &str) {
        self.bar.set_message(format!("question {}", question_idx + 1));
    }

    fn on_evaluation_complete(&self, question_idx: usize, mode: EvaluationMode, elapsed: Duration) {
        self.bar.println(format!(
            "  {} Question {:>2}  {:<5}  {}",
            green("✓"),
            question_idx + 1,
            mode,
            dim(&format!("{:.2}s", elapsed.as_secs_f64())),
        ));
        self.bar.inc(1);
    }

    fn on_evaluation_error(&self, question_idx: usize, mode: EvaluationMode, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Question {:>2}  {:<5}  {}",
            red("✗"),
            question_idx + 1,
            mode,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_questions: usize, failed_evaluations: usize) {
        self.bar.finish_and_clear();
        let total = total_questions * 2;

        if failed_evaluations == 0 {
            eprintln!(
                "{} {} evaluations completed",
                green("✔"),
                bold(&total.to_string())
            );
        } else {
            let reported = self.errors.load(Ordering::SeqCst);
            eprintln!(
                "{} {}/{} evaluations completed  ({})",
                if failed_evaluations == total {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(total - failed_evaluations).to_string()),
                total,
                red(&failure_breakdown(failed_evaluations, reported)),
            );
        }
    }
}

/// `failed` counts every error record; `reported` only those that went
/// through `on_evaluation_error`. The rest come from crashed workers.
fn failure_breakdown(failed: usize, reported: usize) -> String {
    match failed.saturating_sub(reported) {
        0 => format!("{failed} failed"),
        crashed => format!("{failed} failed, {crashed} from crashed workers"),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default run: yule.txt, Verdana 9px, first 5 pages, 5 default questions
  pagebench yule.txt --font Verdana.ttf

  # Expose 10 pages per question, custom questions
  pagebench book.txt -n 10 --question "Who is the narrator?" --question "Where does it end?"

  # Questions from a file (one per line, blank lines skipped)
  pagebench book.txt --questions-file questions.txt -o runs/book.json

  # Only paginate: write images/ and pages.json (no API key needed)
  pagebench --paginate-only book.txt

  # Another provider and model
  pagebench --provider anthropic --model claude-sonnet-4-20250514 book.txt

  # Report to stdout as well as the report file
  pagebench --json book.txt > report.json

OUTPUT FILES:
  images/page{n}.jpg   one rendered page per file (PNG with --format png)
  pages.json           page number → character count
  results.json         model, n_pages_loaded, total_pages, results[]

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides -v / -q)

  A `.env` file in the working directory is loaded at startup.
"#;

/// Compare text and page-image context for long-document question answering.
#[derive(Parser, Debug)]
#[command(
    name = "pagebench",
    version,
    about = "Benchmark LLM question answering over raw text vs rendered page images",
    long_about = "Paginate a plain-text document into fixed-size page images, then ask each \
question twice: once with the first N pages as text, once with the same pages as images. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local text file path or HTTP/HTTPS URL.
    #[arg(default_value = "yule.txt", env = "PAGEBENCH_INPUT")]
    input: String,

    /// TrueType/OpenType font used to render pages.
    #[arg(long, env = "PAGEBENCH_FONT", default_value = "Verdana.ttf")]
    font: PathBuf,

    /// Font size in pixels.
    #[arg(long, env = "PAGEBENCH_FONT_SIZE", default_value_t = 9.0)]
    font_size: f32,

    /// Page width in pixels.
    #[arg(long, env = "PAGEBENCH_WIDTH", default_value_t = 1024)]
    width: u32,

    /// Page height in pixels.
    #[arg(long, env = "PAGEBENCH_HEIGHT", default_value_t = 1024)]
    height: u32,

    /// Left and right margin in pixels.
    #[arg(long, env = "PAGEBENCH_MARGIN_X", default_value_t = 10)]
    margin_x: u32,

    /// Top and bottom margin in pixels.
    #[arg(long, env = "PAGEBENCH_MARGIN_Y", default_value_t = 10)]
    margin_y: u32,

    /// Extra pixels between lines.
    #[arg(long, env = "PAGEBENCH_LINE_SPACING", default_value_t = 6)]
    line_spacing: u32,

    /// Page image format.
    #[arg(long, env = "PAGEBENCH_FORMAT", value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// Directory for rendered page images.
    #[arg(long, env = "PAGEBENCH_IMAGES_DIR", default_value = "images")]
    images_dir: PathBuf,

    /// Page-number → character-count manifest.
    #[arg(long, env = "PAGEBENCH_MANIFEST", default_value = "pages.json")]
    manifest: PathBuf,

    /// Report file.
    #[arg(short, long, env = "PAGEBENCH_OUTPUT", default_value = "results.json")]
    output: PathBuf,

    /// Leading pages exposed per question.
    #[arg(short = 'n', long, env = "PAGEBENCH_PAGES", default_value_t = 5)]
    pages_per_question: usize,

    /// Questions evaluated concurrently.
    #[arg(short, long, env = "PAGEBENCH_CONCURRENCY", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: u64,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PAGEBENCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// A question to ask (repeatable). Replaces the default questions.
    #[arg(long = "question", value_name = "TEXT")]
    questions: Vec<String>,

    /// File with one question per line. Replaces the default questions.
    #[arg(long, env = "PAGEBENCH_QUESTIONS_FILE")]
    questions_file: Option<PathBuf>,

    /// Max LLM output tokens per evaluation.
    #[arg(long, env = "PAGEBENCH_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAGEBENCH_TEMPERATURE")]
    temperature: Option<f32>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAGEBENCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Paginate and write artefacts only; no model calls.
    #[arg(long)]
    paginate_only: bool,

    /// Also print the report as JSON on stdout.
    #[arg(long, env = "PAGEBENCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAGEBENCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGEBENCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGEBENCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Jpeg,
    Png,
}

impl From<FormatArg> for PageImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpeg => PageImageFormat::Jpeg,
            FormatArg::Png => PageImageFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs are suppressed while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.paginate_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BenchmarkProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Paginate-only mode ───────────────────────────────────────────────
    if cli.paginate_only {
        let document = prepare_document(&config)
            .await
            .context("Pagination failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&document.char_counts())
                    .context("Failed to serialise page manifest")?
            );
        } else if !cli.quiet {
            println!("Input:           {}", config.input);
            println!("Pages:           {}", document.len());
            println!("Chars per line:  {}", document.chars_per_line());
            println!("Lines per page:  {}", document.lines_per_page());
            println!("Images:          {}", config.image_dir.display());
            println!("Manifest:        {}", config.manifest_path.display());
        }
        return Ok(());
    }

    // ── Run benchmark ────────────────────────────────────────────────────
    let report = run_benchmark_to_file(&config)
        .await
        .context("Benchmark failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&report, &config, show_progress);
    }

    Ok(())
}

/// One line per question plus the report location.
fn print_summary(report: &BenchmarkReport, config: &BenchmarkConfig, show_progress: bool) {
    if !show_progress {
        eprintln!(
            "Evaluated {} questions ({} failed evaluations)",
            report.results.len(),
            report.failed_evaluations()
        );
    }
    for (i, result) in report.results.iter().enumerate() {
        let mark = |mode: EvaluationMode| match result.get(mode).answer() {
            Some(a) => green(&format!("{mode} {:.1}s", a.time_seconds)),
            None => red(&format!("{mode} failed")),
        };
        eprintln!(
            "  {:>2}. {}  {}  {}",
            i + 1,
            mark(EvaluationMode::Text),
            mark(EvaluationMode::Image),
            dim(&result.question),
        );
    }
    eprintln!(
        "{}  {} · {}/{} pages per question  →  {}",
        if report.failed_evaluations() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.model,
        report.n_pages_loaded,
        report.total_pages,
        bold(&config.report_path.display().to_string()),
    );
}

/// Map CLI args to `BenchmarkConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BenchmarkConfig> {
    let mut questions = Vec::new();
    if let Some(ref path) = cli.questions_file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read questions from {:?}", path))?;
        questions.extend(parse_questions(&contents));
    }
    questions.extend(
        cli.questions
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty()),
    );

    let geometry = PageGeometry {
        width: cli.width,
        height: cli.height,
        margin_x: cli.margin_x,
        margin_y: cli.margin_y,
        line_spacing: cli.line_spacing,
    };

    let mut builder = BenchmarkConfig::builder()
        .input(cli.input.clone())
        .font_path(cli.font.clone())
        .font_size(cli.font_size)
        .geometry(geometry)
        .image_format(cli.format.clone().into())
        .image_dir(cli.images_dir.clone())
        .manifest_path(cli.manifest.clone())
        .report_path(cli.output.clone())
        .pages_per_question(cli.pages_per_question)
        .max_workers(cli.concurrency as usize)
        .download_timeout_secs(cli.download_timeout);

    if cli.questions_file.is_some() || !cli.questions.is_empty() {
        builder = builder.questions(questions);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt.trim().to_string());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_breakdown_separates_worker_crashes() {
        assert_eq!(failure_breakdown(3, 3), "3 failed");
        assert_eq!(failure_breakdown(4, 2), "4 failed, 2 from crashed workers");
    }

    #[test]
    fn callback_counts_reported_errors() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_evaluation_error(0, EvaluationMode::Image, "boom");
        cb.on_evaluation_error(1, EvaluationMode::Text, "boom");
        assert_eq!(cb.errors.load(Ordering::SeqCst), 2);
    }
}
