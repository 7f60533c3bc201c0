//! Error types for the pdf-convert-mcp library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the tool call cannot produce a result
//!   (ambiguous arguments, download failure, worker crash or timeout). The
//!   dispatch façade turns it into an error response at the tool boundary.
//!
//! * [`Degradation`] — **Non-fatal**: the conversion succeeded but delivery
//!   was degraded (upload failed, local archive could not be written). Stored
//!   on [`crate::output::Materialized`] so the caller still gets a successful
//!   response with a fallback.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced while handling one conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Caller errors ─────────────────────────────────────────────────────
    /// Missing, ambiguous, or undecodable caller arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested tool is not one of the supported conversion actions.
    #[error("Unknown action '{name}'. Available actions: {available}")]
    UnknownAction { name: String, available: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck that the URL is reachable.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Worker errors ─────────────────────────────────────────────────────
    /// The worker did not finish before its deadline and was killed.
    #[error(
        "Conversion timed out after {secs}s. The file may be too large or too complex; \
         try a smaller page range or a lower DPI."
    )]
    Timeout { secs: u64 },

    /// The worker ran but exited with a non-zero status.
    #[error("Conversion worker exited with {status}: {detail}")]
    WorkerExitError { status: String, detail: String },

    /// The worker exited cleanly but emitted no parseable result object.
    #[error("Could not parse the conversion worker output.\nRaw output: {raw}")]
    MalformedWorkerOutput { raw: String },

    /// The worker process could not be started at all.
    #[error(
        "Failed to start conversion worker '{program}': {reason}\n\
         Check that the Python interpreter is installed and that PDF_CONVERT_PYTHON \
         (or --python) points to it."
    )]
    SpawnError { program: PathBuf, reason: String },

    /// The worker ran to completion and reported a failed conversion.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a file into the scratch directory.
    #[error("Failed to write scratch file '{path}': {source}")]
    ScratchIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Stable identifier used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::InvalidInput(_) => "invalid_input",
            ConvertError::UnknownAction { .. } => "unknown_action",
            ConvertError::DownloadFailed { .. } => "download_failed",
            ConvertError::DownloadTimeout { .. } => "download_timeout",
            ConvertError::Timeout { .. } => "timeout",
            ConvertError::WorkerExitError { .. } => "worker_exit_error",
            ConvertError::MalformedWorkerOutput { .. } => "malformed_worker_output",
            ConvertError::SpawnError { .. } => "spawn_error",
            ConvertError::ConversionFailed(_) => "conversion_failed",
            ConvertError::ScratchIo { .. } => "scratch_io",
            ConvertError::InvalidConfig(_) => "invalid_config",
            ConvertError::Internal(_) => "internal",
        }
    }
}

/// A non-fatal delivery problem.
///
/// The tool call still succeeds; the message tells the caller what fallback
/// was used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degradation {
    /// Remote storage was configured but the upload produced no URL.
    #[error("Upload of '{file_name}' failed; returning the data inline instead")]
    UploadDegraded { file_name: String },

    /// The local archive could not be written; per-page outputs were kept.
    #[error("Failed to create archive '{path}': {detail}")]
    ArchiveCreationFailed { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_mentions_size_hint() {
        let e = ConvertError::Timeout { secs: 300 };
        let msg = e.to_string();
        assert!(msg.contains("300s"), "got: {msg}");
        assert!(msg.contains("too large"), "got: {msg}");
    }

    #[test]
    fn spawn_error_display_points_at_interpreter() {
        let e = ConvertError::SpawnError {
            program: PathBuf::from("python3"),
            reason: "No such file or directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("python3"));
        assert!(msg.contains("PDF_CONVERT_PYTHON"));
    }

    #[test]
    fn unknown_action_lists_alternatives() {
        let e = ConvertError::UnknownAction {
            name: "pdf_to_mp3".into(),
            available: "pdf_to_docx, pdf_to_jpg".into(),
        };
        assert!(e.to_string().contains("pdf_to_docx, pdf_to_jpg"));
        assert_eq!(e.kind(), "unknown_action");
    }

    #[test]
    fn degradation_display() {
        let d = Degradation::UploadDegraded {
            file_name: "report.zip".into(),
        };
        assert!(d.to_string().contains("report.zip"));
    }
}
