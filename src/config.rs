//! Configuration types for the conversion server.
//!
//! All orchestration behaviour is controlled through [`ServerConfig`], built
//! via its [`ServerConfigBuilder`]. The conversion actions and their
//! per-action parameters live here too, so the worker contract is described
//! in one place.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for the conversion orchestrator.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_convert_mcp::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .worker_program("python3")
///     .worker_script("python/converter.py")
///     .worker_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interpreter (or binary) that runs the conversion worker. Default: `python3`.
    pub worker_program: PathBuf,

    /// Script passed as the first argument to `worker_program`, if any.
    pub worker_script: Option<PathBuf>,

    /// Extra arguments appended after the script.
    pub worker_args: Vec<String>,

    /// Deadline for one worker process, measured from spawn. Default: 300.
    ///
    /// Large scanned documents with OCR enabled routinely take minutes; the
    /// deadline only exists so a wedged worker cannot hold a tool call open
    /// forever.
    pub worker_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory for downloaded inputs, decoded payloads, and scratch archives.
    pub scratch_dir: PathBuf,

    /// Delete per-page outputs after they were archived next to a local input.
    /// Default: true.
    pub remove_archived_outputs: bool,

    /// Maximum characters of raw worker output quoted in error messages. Default: 2000.
    pub max_diagnostic_chars: usize,

    /// Remote storage for results of remote/inline inputs. Default: none.
    pub storage: Option<StorageConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_program: PathBuf::from(default_python()),
            worker_script: None,
            worker_args: Vec::new(),
            worker_timeout_secs: 300,
            download_timeout_secs: 120,
            scratch_dir: std::env::temp_dir().join("pdf-convert-mcp"),
            remove_archived_outputs: true,
            max_diagnostic_chars: 2000,
            storage: None,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }
}

fn default_python() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.worker_program = program.into();
        self
    }

    pub fn worker_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.config.worker_script = Some(script.into());
        self
    }

    pub fn worker_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn worker_timeout_secs(mut self, secs: u64) -> Self {
        self.config.worker_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn remove_archived_outputs(mut self, v: bool) -> Self {
        self.config.remove_archived_outputs = v;
        self
    }

    pub fn max_diagnostic_chars(mut self, n: usize) -> Self {
        self.config.max_diagnostic_chars = n.max(80);
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = Some(storage);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if c.worker_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Worker timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.worker_program.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Worker program must not be empty".into(),
            ));
        }
        if let Some(ref storage) = c.storage {
            if reqwest::Url::parse(&storage.upload_url).is_err() {
                return Err(ConvertError::InvalidConfig(format!(
                    "Storage upload URL is not a valid URL: '{}'",
                    storage.upload_url
                )));
            }
        }
        Ok(self.config)
    }
}

/// Where and how results are uploaded when the caller cannot read local files.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL objects are `PUT` under, e.g. `https://bucket.example.com/uploads`.
    pub upload_url: String,
    /// Base URL handed back to callers. Falls back to `upload_url`.
    pub public_base_url: Option<String>,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub auth_token: Option<String>,
    /// Per-upload timeout in seconds.
    pub timeout_secs: u64,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("upload_url", &self.upload_url)
            .field("public_base_url", &self.public_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Actions ──────────────────────────────────────────────────────────────

/// The fixed set of conversions the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionAction {
    /// PDF → Word document.
    PdfToDocx,
    /// PDF tables → Excel workbook.
    PdfToExcel,
    /// PDF pages → PowerPoint slides.
    PdfToPpt,
    /// PDF pages → one JPEG per page.
    PdfToJpg,
}

impl ConversionAction {
    pub const ALL: [ConversionAction; 4] = [
        ConversionAction::PdfToDocx,
        ConversionAction::PdfToExcel,
        ConversionAction::PdfToPpt,
        ConversionAction::PdfToJpg,
    ];

    /// Canonical action identifier, shared by the tool name and the worker request.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConversionAction::PdfToDocx => "pdf_to_docx",
            ConversionAction::PdfToExcel => "pdf_to_excel",
            ConversionAction::PdfToPpt => "pdf_to_ppt",
            ConversionAction::PdfToJpg => "pdf_to_jpg",
        }
    }

    /// One-line tool description published through `tools/list`.
    pub const fn description(&self) -> &'static str {
        match self {
            ConversionAction::PdfToDocx => {
                "Convert a PDF to an editable Word document (.docx)."
            }
            ConversionAction::PdfToExcel => {
                "Extract the tables of a PDF into an Excel workbook (.xlsx), optionally with OCR."
            }
            ConversionAction::PdfToPpt => {
                "Convert each PDF page into a PowerPoint slide (.pptx)."
            }
            ConversionAction::PdfToJpg => {
                "Render each PDF page as a JPEG image; multi-page results are delivered as a .zip."
            }
        }
    }

    /// Comma-separated list of every action, for error messages.
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Keep only the parameters this action forwards to the worker.
    ///
    /// Irrelevant fields become `None` and are therefore omitted from the
    /// serialised worker request rather than sent as `null`.
    pub fn relevant_params(&self, params: &ConversionParams) -> ConversionParams {
        match self {
            ConversionAction::PdfToDocx => ConversionParams {
                fast_mode: params.fast_mode,
                ..ConversionParams::default()
            },
            ConversionAction::PdfToExcel => ConversionParams {
                pages: params.pages.clone(),
                use_ocr: params.use_ocr,
                ..ConversionParams::default()
            },
            ConversionAction::PdfToPpt => ConversionParams {
                dpi: params.dpi,
                ..ConversionParams::default()
            },
            ConversionAction::PdfToJpg => ConversionParams {
                dpi: params.dpi,
                quality: params.quality,
                ..ConversionParams::default()
            },
        }
    }
}

impl fmt::Display for ConversionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionAction {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ConvertError::UnknownAction {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

/// Action-specific optional parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Rendering resolution (`pdf_to_ppt`, `pdf_to_jpg`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    /// JPEG quality 1–100 (`pdf_to_jpg`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Page range such as `"all"`, `"1-3"`, `"1,3,5"` (`pdf_to_excel`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    /// Run OCR on scanned pages (`pdf_to_excel`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_ocr: Option<bool>,
    /// Trade layout fidelity for speed (`pdf_to_docx`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_mode: Option<bool>,
}
