//! Output materialization: turn a worker result into something the caller can use.
//!
//! ## Decision tree
//!
//! ```text
//!                    ┌── temporary input ──▶ archive ─▶ upload | inline   (outputs deleted)
//! output_paths ──────┤
//!                    └── local input ──────▶ archive next to outputs     (outputs deleted
//!                                                                         once archived)
//!                    ┌── temporary input ──▶ upload | inline              (output deleted)
//! output_path ───────┤
//!                    └── local input ──────▶ report the path
//! ```
//!
//! Callers with a temporary input (URL or inline payload) are assumed to have
//! no access to this machine's filesystem, so they never get a bare path back.
//! Nothing here fails the call: delivery problems become [`Degradation`]s and
//! a line in the message.

use crate::config::ServerConfig;
use crate::error::Degradation;
use crate::output::{InlinePayload, Materialized};
use crate::pipeline::archive::{archive_name_for, archive_path_for, build_archive_blocking};
use crate::pipeline::cleanup::{remove_best_effort, ScratchFile};
use crate::pipeline::encode::encode_payload;
use crate::pipeline::worker::{WorkerOutput, WorkerResult};
use crate::storage::RemoteStorage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Decide how to hand the worker's outputs back, and clean up what the
/// orchestrator owns.
pub async fn materialize(
    result: WorkerResult,
    input_was_temporary: bool,
    config: &ServerConfig,
    storage: Option<&dyn RemoteStorage>,
) -> Materialized {
    let mut report = Report::new(result.message);

    match result.output {
        WorkerOutput::MultiFile(paths) if input_was_temporary => {
            multi_file_remote(&paths, config, storage, &mut report).await
        }
        WorkerOutput::MultiFile(paths) => multi_file_local(&paths, config, &mut report).await,
        WorkerOutput::SingleFile(path) if input_was_temporary => {
            single_file_remote(&path, config, storage, &mut report).await
        }
        WorkerOutput::SingleFile(path) => {
            report.line(format!("Output saved to: {}", path.display()));
        }
    }

    report.finish()
}

// ── Accumulated response ─────────────────────────────────────────────────

struct Report {
    lines: Vec<String>,
    inline: Option<InlinePayload>,
    degradations: Vec<Degradation>,
}

impl Report {
    fn new(summary: String) -> Self {
        Self {
            lines: vec![summary],
            inline: None,
            degradations: Vec::new(),
        }
    }

    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn degrade(&mut self, d: Degradation) {
        warn!("{}", d);
        self.lines.push(d.to_string());
        self.degradations.push(d);
    }

    fn finish(self) -> Materialized {
        Materialized {
            message: self.lines.join("\n"),
            inline: self.inline,
            degradations: self.degradations,
        }
    }
}

// ── Multi-file ───────────────────────────────────────────────────────────

async fn multi_file_remote(
    paths: &[PathBuf],
    config: &ServerConfig,
    storage: Option<&dyn RemoteStorage>,
    report: &mut Report,
) {
    // Worker outputs live in scratch space on behalf of a remote caller:
    // they are removed whatever happens below.
    let _owned: Vec<ScratchFile> = paths.iter().cloned().map(ScratchFile::adopt).collect();
    let Some(first) = paths.first() else {
        report.line("The worker listed no output files.");
        return;
    };
    let name = archive_name_for(first);

    let archive = match build_archive_blocking(paths).await {
        Ok(a) => a,
        Err(e) => {
            report.degrade(Degradation::ArchiveCreationFailed {
                path: PathBuf::from(&name),
                detail: e.to_string(),
            });
            return;
        }
    };
    if archive.included.is_empty() {
        report.line(format!(
            "None of the {} listed output files exist anymore; nothing to return.",
            paths.len()
        ));
        return;
    }
    info!(
        "Archived {}/{} outputs into {} ({} bytes)",
        archive.included.len(),
        paths.len(),
        name,
        archive.bytes.len()
    );
    report.line(format!("Packed {} files into {}.", archive.included.len(), name));
    deliver(&name, archive.bytes, None, config, storage, report).await;
}

async fn multi_file_local(paths: &[PathBuf], config: &ServerConfig, report: &mut Report) {
    let Some(first) = paths.first() else {
        report.line("The worker listed no output files.");
        return;
    };
    let archive_path = archive_path_for(first);

    let archive = match build_archive_blocking(paths).await {
        Ok(a) => a,
        Err(e) => {
            report.degrade(Degradation::ArchiveCreationFailed {
                path: archive_path,
                detail: e.to_string(),
            });
            list_outputs(paths, report);
            return;
        }
    };
    if archive.included.is_empty() {
        report.line(format!(
            "None of the {} listed output files exist anymore; no archive was created.",
            paths.len()
        ));
        return;
    }

    if let Err(e) = tokio::fs::write(&archive_path, &archive.bytes).await {
        report.degrade(Degradation::ArchiveCreationFailed {
            path: archive_path,
            detail: e.to_string(),
        });
        list_outputs(&archive.included, report);
        return;
    }
    info!(
        "Wrote archive {} with {} files",
        archive_path.display(),
        archive.included.len()
    );

    if config.remove_archived_outputs {
        for path in &archive.included {
            remove_best_effort(path);
        }
    }
    report.line(format!(
        "Archived {} files to: {}",
        archive.included.len(),
        archive_path.display()
    ));
    if !config.remove_archived_outputs {
        list_outputs(&archive.included, report);
    }
}

fn list_outputs(paths: &[PathBuf], report: &mut Report) {
    report.line("Individual output files:");
    for p in paths {
        report.line(format!("  {}", p.display()));
    }
}

// ── Single file ──────────────────────────────────────────────────────────

async fn single_file_remote(
    path: &Path,
    config: &ServerConfig,
    storage: Option<&dyn RemoteStorage>,
    report: &mut Report,
) {
    let owned = ScratchFile::adopt(path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let bytes = match tokio::fs::read(owned.path()).await {
        Ok(b) => b,
        Err(e) => {
            debug!("Output {} unreadable: {}", path.display(), e);
            report.line(format!(
                "Output file {} no longer exists; nothing to return.",
                name
            ));
            return;
        }
    };
    deliver(&name, bytes, Some(owned.path()), config, storage, report).await;
}

// ── Delivery ─────────────────────────────────────────────────────────────

/// Upload `bytes` when storage is configured, otherwise (or when the upload
/// yields nothing) attach them inline.
///
/// `on_disk` is an existing copy of the bytes; without one a scratch file is
/// written for the upload and removed afterwards.
async fn deliver(
    name: &str,
    bytes: Vec<u8>,
    on_disk: Option<&Path>,
    config: &ServerConfig,
    storage: Option<&dyn RemoteStorage>,
    report: &mut Report,
) {
    if let Some(storage) = storage {
        if let Some(url) = upload(name, &bytes, on_disk, config, storage).await {
            report.line(format!("Download URL: {url}"));
            return;
        }
        report.degrade(Degradation::UploadDegraded {
            file_name: name.to_string(),
        });
    }

    report.line(format!(
        "{} ({} bytes) is attached inline as base64.",
        name,
        bytes.len()
    ));
    report.inline = Some(encode_payload(name, &bytes));
}

async fn upload(
    name: &str,
    bytes: &[u8],
    on_disk: Option<&Path>,
    config: &ServerConfig,
    storage: &dyn RemoteStorage,
) -> Option<String> {
    if let Some(path) = on_disk {
        return storage.upload(path, name).await;
    }
    let staged = match ScratchFile::write(&config.scratch_dir, "upload-", &format!("-{name}"), bytes)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not stage {} for upload: {}", name, e);
            return None;
        }
    };
    storage.upload(staged.path(), name).await
}
