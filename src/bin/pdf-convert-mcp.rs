//! CLI binary for pdf-convert-mcp.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServerConfig` and starts the selected transport.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_convert_mcp::transport::{self, AppState, SessionRegistry};
use pdf_convert_mcp::{McpHandler, Orchestrator, ServerConfig, StorageConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"TOOLS:
  pdf_to_docx    PDF → Word (.docx)            fast_mode
  pdf_to_excel   PDF tables → Excel (.xlsx)    pages, use_ocr
  pdf_to_ppt     PDF pages → PowerPoint (.pptx) dpi
  pdf_to_jpg     PDF pages → JPEG (.zip)       dpi, quality

  Every tool takes exactly one of pdf_path, pdf_url or pdf_base64, plus an
  optional output_path.

EXAMPLES:
  # Pipe transport for a desktop client
  pdf-convert-mcp --worker-script ./python/converter.py

  # HTTP/SSE transport, results of remote inputs uploaded to a bucket
  pdf-convert-mcp --transport sse --bind 0.0.0.0:8787 \
      --worker-script ./python/converter.py \
      --storage-upload-url https://bucket.example.com/uploads \
      --storage-public-url https://cdn.example.com/uploads

ENVIRONMENT VARIABLES:
  PDF_CONVERT_PYTHON        Interpreter running the worker (default: python3)
  PDF_CONVERT_WORKER        Worker script path
  PDF_CONVERT_STORAGE_TOKEN Bearer token for uploads
  RUST_LOG                  Overrides the log filter (logs go to stderr)
"#;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TransportArg {
    /// JSON-RPC lines on stdin/stdout (one session).
    Stdio,
    /// HTTP with Server-Sent Events (many sessions).
    Sse,
}

/// Serve PDF conversion tools over stdio or HTTP/SSE.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-convert-mcp",
    version,
    about = "Serve PDF conversion tools (Word, Excel, PowerPoint, JPEG) over stdio or HTTP/SSE",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Delivery mode.
    #[arg(long, env = "PDF_CONVERT_TRANSPORT", value_enum, default_value = "stdio")]
    transport: TransportArg,

    /// Listen address for the sse transport.
    #[arg(long, env = "PDF_CONVERT_BIND", default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Interpreter (or executable) that runs the conversion worker.
    #[arg(long = "python", env = "PDF_CONVERT_PYTHON")]
    python: Option<PathBuf>,

    /// Worker script passed to the interpreter.
    #[arg(long, env = "PDF_CONVERT_WORKER")]
    worker_script: Option<PathBuf>,

    /// Extra argument for the worker (repeatable).
    #[arg(long = "worker-arg", env = "PDF_CONVERT_WORKER_ARGS", value_delimiter = ' ')]
    worker_args: Vec<String>,

    /// Seconds before a worker is killed.
    #[arg(long, env = "PDF_CONVERT_WORKER_TIMEOUT", default_value_t = 300)]
    worker_timeout: u64,

    /// HTTP download timeout in seconds for pdf_url inputs.
    #[arg(long, env = "PDF_CONVERT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Directory for downloads, decoded payloads and staged archives.
    #[arg(long, env = "PDF_CONVERT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Keep per-page outputs after archiving them next to a local input.
    #[arg(long, env = "PDF_CONVERT_KEEP_PAGE_OUTPUTS")]
    keep_page_outputs: bool,

    /// Base URL results are uploaded to with HTTP PUT.
    #[arg(long, env = "PDF_CONVERT_STORAGE_UPLOAD_URL")]
    storage_upload_url: Option<String>,

    /// Public base URL returned to callers (defaults to the upload URL).
    #[arg(long, env = "PDF_CONVERT_STORAGE_PUBLIC_URL", requires = "storage_upload_url")]
    storage_public_url: Option<String>,

    /// Bearer token for uploads.
    #[arg(long, env = "PDF_CONVERT_STORAGE_TOKEN", hide_env_values = true)]
    storage_token: Option<String>,

    /// Upload timeout in seconds.
    #[arg(long, env = "PDF_CONVERT_STORAGE_TIMEOUT", default_value_t = 60)]
    storage_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_CONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "PDF_CONVERT_QUIET")]
    quiet: bool,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder()
            .worker_args(self.worker_args.iter().filter(|a| !a.is_empty()).cloned())
            .worker_timeout_secs(self.worker_timeout)
            .download_timeout_secs(self.download_timeout)
            .remove_archived_outputs(!self.keep_page_outputs);
        if let Some(ref python) = self.python {
            builder = builder.worker_program(python);
        }
        if let Some(ref script) = self.worker_script {
            builder = builder.worker_script(script);
        }
        if let Some(ref dir) = self.scratch_dir {
            builder = builder.scratch_dir(dir);
        }
        if let Some(ref upload_url) = self.storage_upload_url {
            builder = builder.storage(StorageConfig {
                upload_url: upload_url.clone(),
                public_base_url: self.storage_public_url.clone(),
                auth_token: self.storage_token.clone(),
                timeout_secs: self.storage_timeout,
            });
        }
        builder.build().context("invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // stdout carries protocol frames in stdio mode, so logs always go to stderr.
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.server_config()?;
    info!(
        "Worker: {} {}",
        config.worker_program.display(),
        config
            .worker_script
            .as_ref()
            .map(|s| s.display().to_string())
            .unwrap_or_default()
    );
    if config.storage.is_none() {
        info!("No remote storage configured; remote inputs receive results inline");
    }

    let orchestrator = Orchestrator::from_config(config).context("failed to set up storage")?;
    let handler = McpHandler::new(orchestrator);

    match cli.transport {
        TransportArg::Stdio => transport::serve_stdio(handler)
            .await
            .context("stdio transport failed")?,
        TransportArg::Sse => {
            let state = AppState {
                handler,
                sessions: SessionRegistry::new(),
            };
            transport::serve(cli.bind, state)
                .await
                .with_context(|| format!("failed to serve on {}", cli.bind))?
        }
    }

    info!("Server stopped");
    Ok(())
}
