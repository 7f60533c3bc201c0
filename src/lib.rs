//! # pdf-convert-mcp
//!
//! A tool-invocation server that converts PDFs to Word, Excel, PowerPoint
//! and JPEG by delegating to an external conversion worker.
//!
//! ## Request Flow
//!
//! ```text
//! tools/call
//!  │
//!  ├─ 1. Dispatch     validate the action and exactly-one input variant
//!  ├─ 2. Resolve      local path, downloaded URL, or decoded base64 → file
//!  ├─ 3. Invoke       one worker process per call, JSON on stdin/stdout,
//!  │                  killed at the deadline
//!  ├─ 4. Materialize  path, zip archive, remote URL, or inline base64
//!  └─ 5. Cleanup      every scratch file is removed, success or failure
//! ```
//!
//! Two transports share the same [`Orchestrator`]: a line-delimited
//! JSON-RPC session on stdio and a multi-session HTTP/SSE server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_convert_mcp::{Orchestrator, ServerConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .worker_script("python/converter.py")
//!         .build()?;
//!     let orchestrator = Orchestrator::from_config(config)?;
//!     let response = orchestrator
//!         .call_tool("pdf_to_docx", json!({ "pdf_path": "report.pdf" }))
//!         .await;
//!     println!("{}", response.text().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-convert-mcp` binary (clap + anyhow + tracing-subscriber) |

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod protocol;
pub mod storage;
pub mod transport;

// Re-export the primary public API at the crate root.
pub use config::{ConversionAction, ConversionParams, ServerConfig, ServerConfigBuilder, StorageConfig};
pub use convert::{ConversionRequest, Orchestrator, ToolArguments};
pub use error::{ConvertError, Degradation};
pub use output::{InlinePayload, Materialized, ToolContent, ToolResponse};
pub use protocol::McpHandler;
pub use storage::{HttpStorage, RemoteStorage};
pub use transport::SessionRegistry;
