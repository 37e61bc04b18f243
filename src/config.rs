//! Configuration types for a text-vs-image benchmark run.
//!
//! All run behaviour is controlled through [`BenchmarkConfig`], built via its
//! [`BenchmarkConfigBuilder`]. Page geometry lives in its own `Copy` struct,
//! [`PageGeometry`], so the paginator can take it by value into a blocking
//! task without dragging the rest of the config along.

use crate::client::ModelClient;
use crate::error::BenchError;
use crate::progress::ProgressCallback;
use crate::prompts::{DEFAULT_QUESTIONS, DEFAULT_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for one benchmark run.
///
/// Built via [`BenchmarkConfig::builder()`] or using
/// [`BenchmarkConfig::default()`].
///
/// # Example
/// ```rust
/// use pagebench::BenchmarkConfig;
///
/// let config = BenchmarkConfig::builder()
///     .input("novel.txt")
///     .font_path("DejaVuSans.ttf")
///     .pages_per_question(3)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BenchmarkConfig {
    /// Document to benchmark: a local path or an HTTP/HTTPS URL. Default: `yule.txt`.
    pub input: String,

    /// TrueType/OpenType font used for every page. Default: `Verdana.ttf`.
    pub font_path: PathBuf,

    /// Font em size in pixels. Default: 9.
    pub font_size: f32,

    /// Canvas size, margins and line spacing.
    pub geometry: PageGeometry,

    /// Raster format for persisted pages and data URIs. Default: JPEG.
    pub image_format: PageImageFormat,

    /// Directory receiving `page{n}.{ext}` files. Default: `images`.
    pub image_dir: PathBuf,

    /// Page-number → character-count manifest. Default: `pages.json`.
    pub manifest_path: PathBuf,

    /// Final report location. Default: `results.json`.
    pub report_path: PathBuf,

    /// Number of leading pages exposed to the model per question (N). Default: 5.
    ///
    /// Clamped to the document's page count at run time.
    pub pages_per_question: usize,

    /// Upper bound on concurrently evaluated questions. Default: 5.
    ///
    /// The pool size is `min(questions.len(), max_workers)`.
    pub max_workers: usize,

    /// Questions asked, in report order.
    pub questions: Vec<String>,

    /// System instruction sent first in both modes.
    pub system_prompt: String,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `client`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed model client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Completion token cap. None leaves the provider default in place.
    pub max_tokens: Option<usize>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-question progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            input: "yule.txt".to_string(),
            font_path: PathBuf::from("Verdana.ttf"),
            font_size: 9.0,
            geometry: PageGeometry::default(),
            image_format: PageImageFormat::default(),
            image_dir: PathBuf::from("images"),
            manifest_path: PathBuf::from("pages.json"),
            report_path: PathBuf::from("results.json"),
            pages_per_question: 5,
            max_workers: 5,
            questions: DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            provider_name: None,
            client: None,
            temperature: None,
            max_tokens: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkConfig")
            .field("input", &self.input)
            .field("font_path", &self.font_path)
            .field("font_size", &self.font_size)
            .field("geometry", &self.geometry)
            .field("image_format", &self.image_format)
            .field("image_dir", &self.image_dir)
            .field("pages_per_question", &self.pages_per_question)
            .field("max_workers", &self.max_workers)
            .field("questions", &self.questions.len())
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BenchmarkProgressCallback>"),
            )
            .finish()
    }
}

impl BenchmarkConfig {
    /// Create a new builder for `BenchmarkConfig`.
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model identifier recorded in the report and requested from the provider.
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`BenchmarkConfig`].
#[derive(Debug)]
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.config.input = input.into();
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = path.into();
        self
    }

    pub fn font_size(mut self, px: f32) -> Self {
        self.config.font_size = px;
        self
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn image_format(mut self, format: PageImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.image_dir = dir.into();
        self
    }

    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manifest_path = path.into();
        self
    }

    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report_path = path.into();
        self
    }

    pub fn pages_per_question(mut self, n: usize) -> Self {
        self.config.pages_per_question = n;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    pub fn questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.questions = questions.into_iter().map(Into::into).collect();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BenchmarkConfig, BenchError> {
        let c = &self.config;
        c.geometry.validate()?;
        if c.font_size.is_nan() || c.font_size <= 0.0 {
            return Err(BenchError::InvalidConfig(format!(
                "Font size must be positive, got {}",
                c.font_size
            )));
        }
        if c.max_workers == 0 {
            return Err(BenchError::InvalidConfig("Max workers must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Fixed page geometry shared by every page of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Canvas width in pixels. Default: 1024.
    pub width: u32,
    /// Canvas height in pixels. Default: 1024.
    pub height: u32,
    /// Left and right margin in pixels. Default: 10.
    pub margin_x: u32,
    /// Top and bottom margin in pixels. Default: 10.
    pub margin_y: u32,
    /// Extra pixels between consecutive lines. Default: 6.
    pub line_spacing: u32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            margin_x: 10,
            margin_y: 10,
            line_spacing: 6,
        }
    }
}

impl PageGeometry {
    /// Canvas width less both horizontal margins (0 if the margins overrun).
    pub fn usable_width(&self) -> u32 {
        self.width.saturating_sub(self.margin_x.saturating_mul(2))
    }

    /// Canvas height less both vertical margins (0 if the margins overrun).
    pub fn usable_height(&self) -> u32 {
        self.height.saturating_sub(self.margin_y.saturating_mul(2))
    }

    /// Reject geometries that leave no drawable area.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.usable_width() == 0 || self.usable_height() == 0 {
            return Err(BenchError::InvalidConfig(format!(
                "Margins {}x{} leave no drawable area on a {}x{} canvas",
                self.margin_x, self.margin_y, self.width, self.height
            )));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Raster format used for page files and for the image data URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageImageFormat {
    /// Lossy, small payloads. (default)
    #[default]
    Jpeg,
    /// Lossless, larger payloads.
    Png,
}

impl PageImageFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            PageImageFormat::Jpeg => "jpg",
            PageImageFormat::Png => "png",
        }
    }

    /// MIME type placed in the data URI.
    pub fn mime_type(&self) -> &'static str {
        match self {
            PageImageFormat::Jpeg => "image/jpeg",
            PageImageFormat::Png => "image/png",
        }
    }

    pub(crate) fn as_image_format(&self) -> image::ImageFormat {
        match self {
            PageImageFormat::Jpeg => image::ImageFormat::Jpeg,
            PageImageFormat::Png => image::ImageFormat::Png,
        }
    }
}
