//! Tool dispatch: validate a tool call and drive it through the pipeline.
//!
//! [`Orchestrator::call_tool`] is the only entry point the protocol layer
//! uses. It never returns an error and never lets a panic escape; every
//! failure becomes a [`ToolResponse`] with `isError: true`.

use crate::config::{ConversionAction, ConversionParams, ServerConfig};
use crate::error::ConvertError;
use crate::output::{Materialized, ToolResponse};
use crate::pipeline::input::{self, InputSource};
use crate::pipeline::{materialize, worker};
use crate::storage::{HttpStorage, RemoteStorage};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Arguments accepted by every conversion tool.
///
/// Exactly one of `pdf_path`, `pdf_url` and `pdf_base64` must be given.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ToolArguments {
    /// Path to a PDF on the server's filesystem. A bare file name is also
    /// looked up in the working directory, Downloads, Documents and Desktop.
    #[serde(default)]
    pub pdf_path: Option<String>,
    /// HTTP(S) URL of a PDF to download.
    #[serde(default)]
    pub pdf_url: Option<String>,
    /// Base64-encoded PDF bytes (a `data:application/pdf;base64,` prefix is accepted).
    #[serde(default)]
    pub pdf_base64: Option<String>,
    /// Where to write the result. Defaults to next to the input.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Rendering resolution in DPI (pdf_to_ppt, pdf_to_jpg).
    #[serde(default)]
    pub dpi: Option<u32>,
    /// JPEG quality from 1 to 100 (pdf_to_jpg).
    #[serde(default)]
    pub quality: Option<u8>,
    /// Page selection such as "all", "1-3" or "1,4,6" (pdf_to_excel).
    #[serde(default)]
    pub pages: Option<String>,
    /// Run OCR on scanned pages (pdf_to_excel).
    #[serde(default)]
    pub use_ocr: Option<bool>,
    /// Trade layout fidelity for speed (pdf_to_docx).
    #[serde(default)]
    pub fast_mode: Option<bool>,
}

impl ToolArguments {
    /// Parse raw JSON arguments; a missing or `null` object counts as empty.
    pub fn from_value(arguments: Value) -> Result<Self, ConvertError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        serde_json::from_value(arguments)
            .map_err(|e| ConvertError::InvalidInput(format!("invalid tool arguments: {e}")))
    }

    /// Validate and turn into a request for `action`.
    pub fn into_request(self, action: ConversionAction) -> Result<ConversionRequest, ConvertError> {
        let source = InputSource::select(
            self.pdf_path.as_deref(),
            self.pdf_url.as_deref(),
            self.pdf_base64.as_deref(),
        )?;
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(ConvertError::InvalidInput(format!(
                    "quality must be between 1 and 100, got {q}"
                )));
            }
        }
        if self.dpi == Some(0) {
            return Err(ConvertError::InvalidInput("dpi must be positive".into()));
        }
        Ok(ConversionRequest {
            action,
            source,
            output_path: self
                .output_path
                .filter(|p| !p.trim().is_empty())
                .map(|p| PathBuf::from(input::clean_path_arg(&p))),
            params: ConversionParams {
                dpi: self.dpi,
                quality: self.quality,
                pages: self.pages.filter(|p| !p.trim().is_empty()),
                use_ocr: self.use_ocr,
                fast_mode: self.fast_mode,
            },
        })
    }
}

/// A validated conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub action: ConversionAction,
    pub source: InputSource,
    pub output_path: Option<PathBuf>,
    pub params: ConversionParams,
}

/// Shared entry point for both transports. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<ServerConfig>,
    storage: Option<Arc<dyn RemoteStorage>>,
}

impl Orchestrator {
    /// Orchestrator without remote storage: remote callers get inline data.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            storage: None,
        }
    }

    /// Build from config, wiring up [`HttpStorage`] when storage is configured.
    pub fn from_config(config: ServerConfig) -> Result<Self, ConvertError> {
        let storage = match config.storage.clone() {
            Some(sc) => {
                let http = HttpStorage::new(sc).map_err(|e| {
                    ConvertError::InvalidConfig(format!("storage client: {e}"))
                })?;
                Some(Arc::new(http) as Arc<dyn RemoteStorage>)
            }
            None => None,
        };
        Ok(Self {
            config: Arc::new(config),
            storage,
        })
    }

    /// Replace the storage capability.
    pub fn with_storage(mut self, storage: Arc<dyn RemoteStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the tool `name` with raw JSON `arguments`.
    ///
    /// Validation happens before anything touches the filesystem or spawns
    /// a process. The conversion itself runs on its own task so a panic in
    /// any stage is reported like any other failure.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResponse {
        let request = match name
            .parse::<ConversionAction>()
            .and_then(|action| ToolArguments::from_value(arguments)?.into_request(action))
        {
            Ok(r) => r,
            Err(e) => {
                warn!(tool = name, kind = e.kind(), "Rejected tool call: {}", e);
                return ToolResponse::error(format!("Error: {e}"));
            }
        };

        let this = self.clone();
        match tokio::spawn(async move { this.convert(request).await }).await {
            Ok(Ok(materialized)) => materialized.into(),
            Ok(Err(e)) => {
                warn!(tool = name, kind = e.kind(), "Conversion failed: {}", e);
                ToolResponse::error(format!("Error: {e}"))
            }
            Err(join_err) => {
                error!(tool = name, "Conversion task aborted: {}", join_err);
                ToolResponse::error(format!(
                    "Error: internal failure while converting ({join_err})"
                ))
            }
        }
    }

    /// Resolve, invoke, materialize.
    ///
    /// A temporary input is owned by the resolved value and removed when it
    /// drops at the end of this call, on success and failure alike.
    pub async fn convert(&self, request: ConversionRequest) -> Result<Materialized, ConvertError> {
        let start = Instant::now();
        info!(
            action = %request.action,
            "Starting conversion from {} input",
            request.source.kind()
        );

        // ── Step 1: Resolve input ────────────────────────────────────────
        let resolved = input::resolve_input(&request.source, &self.config).await?;

        // ── Step 2: Run the worker ───────────────────────────────────────
        let result = worker::invoke(
            request.action,
            resolved.path(),
            request.output_path.as_deref(),
            &request.params,
            &self.config,
        )
        .await?;

        // ── Step 3: Deliver outputs ──────────────────────────────────────
        let materialized = materialize::materialize(
            result,
            resolved.is_temporary(),
            &self.config,
            self.storage.as_deref(),
        )
        .await;

        info!(
            action = %request.action,
            degradations = materialized.degradations.len(),
            "Conversion finished in {}ms",
            start.elapsed().as_millis()
        );
        Ok(materialized)
    }
}
