//! Worker invocation: one child process per conversion.
//!
//! The worker reads a single JSON request from stdin, writes a single JSON
//! result to stdout, and exits. Converters built on Python libraries print
//! progress and warnings to stdout as well, so the result object has to be
//! dug out of noisy output (see [`parse_worker_output`]).
//!
//! ## Terminal events
//!
//! Exactly one outcome is produced per invocation. The deadline, measured
//! from spawn, races the worker's exit together with draining its pipes
//! under `tokio::time::timeout_at`; whichever finishes first wins. On
//! timeout the child is killed and anything it printed is discarded.

use crate::config::{ConversionAction, ConversionParams, ServerConfig};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on what is kept from each of the worker's output pipes.
const MAX_CAPTURE_BYTES: usize = 4 * 1024 * 1024;

/// The structured request written to the worker's stdin.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRequest<'a> {
    pub action: ConversionAction,
    pub pdf_path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<&'a Path>,
    #[serde(flatten)]
    pub params: ConversionParams,
}

impl<'a> WorkerRequest<'a> {
    /// Build a request carrying only the parameters `action` uses.
    pub fn new(
        action: ConversionAction,
        pdf_path: &'a Path,
        output_path: Option<&'a Path>,
        params: &ConversionParams,
    ) -> Self {
        Self {
            action,
            pdf_path,
            output_path,
            params: action.relevant_params(params),
        }
    }
}

/// Result object as emitted by the worker.
#[derive(Debug, Clone, Deserialize)]
struct RawWorkerResult {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    output_path: Option<PathBuf>,
    #[serde(default)]
    output_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    error: Option<String>,
}

/// Where the worker put its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    SingleFile(PathBuf),
    MultiFile(Vec<PathBuf>),
}

/// A successful worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    /// The worker's human-readable summary.
    pub message: String,
    pub output: WorkerOutput,
}

impl WorkerResult {
    fn from_raw(raw: RawWorkerResult) -> Result<Self, ConvertError> {
        if !raw.success {
            return Err(ConvertError::ConversionFailed(
                raw.error
                    .unwrap_or_else(|| "the worker reported failure without details".into()),
            ));
        }
        let message = raw
            .message
            .unwrap_or_else(|| "Conversion completed".to_string());
        // `output_paths` wins when a worker sets both.
        let output = match (raw.output_paths, raw.output_path) {
            (Some(paths), _) => WorkerOutput::MultiFile(paths),
            (None, Some(path)) => WorkerOutput::SingleFile(path),
            (None, None) => {
                return Err(ConvertError::MalformedWorkerOutput {
                    raw: "result has success=true but neither output_path nor output_paths"
                        .into(),
                })
            }
        };
        Ok(WorkerResult { message, output })
    }
}

/// Spawn the worker, feed it one request, and wait for its result.
pub async fn invoke(
    action: ConversionAction,
    pdf_path: &Path,
    output_path: Option<&Path>,
    params: &ConversionParams,
    config: &ServerConfig,
) -> Result<WorkerResult, ConvertError> {
    let request = WorkerRequest::new(action, pdf_path, output_path, params);
    let payload = serde_json::to_vec(&request)
        .map_err(|e| ConvertError::Internal(format!("Failed to encode worker request: {e}")))?;

    let mut command = Command::new(&config.worker_program);
    if let Some(ref script) = config.worker_script {
        command.arg(script);
    }
    command
        .args(&config.worker_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = command.spawn().map_err(|e| ConvertError::SpawnError {
        program: config.worker_program.clone(),
        reason: e.to_string(),
    })?;
    info!(
        action = %action,
        pid = child.id().unwrap_or_default(),
        "Spawned conversion worker for {}",
        pdf_path.display()
    );

    let mut stdout_task = child.stdout.take().map(spawn_reader);
    let mut stderr_task = child.stderr.take().map(spawn_reader);

    // The deadline runs from spawn and covers feeding stdin, the exit and
    // draining both pipes. A helper process that inherits stdout keeps the
    // pipe open after the worker exits; that must not outlive the deadline.
    let deadline = tokio::time::Instant::from_std(start)
        + Duration::from_secs(config.worker_timeout_secs);
    let run = async {
        if let Some(mut stdin) = child.stdin.take() {
            // A worker that exits before reading closes the pipe; its exit
            // status carries the real story, so write errors are only logged.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!("Worker stdin write failed: {}", e);
            }
            drop(stdin);
        }
        let status = child.wait().await;
        let stdout = join_reader(stdout_task.as_mut()).await;
        let stderr = join_reader(stderr_task.as_mut()).await;
        (status, stdout, stderr)
    };
    let outcome = tokio::time::timeout_at(deadline, run).await;
    let (status, stdout, stderr) = match outcome {
        Ok((status, stdout, stderr)) => {
            let status = status
                .map_err(|e| ConvertError::Internal(format!("Failed to wait for worker: {e}")))?;
            (status, stdout, stderr)
        }
        Err(_elapsed) => {
            warn!(
                action = %action,
                "Worker exceeded {}s deadline; killing it",
                config.worker_timeout_secs
            );
            // Fails harmlessly when the worker already exited and only a
            // helper still holds its pipes.
            if let Err(e) = child.kill().await {
                debug!("Kill after deadline: {}", e);
            }
            abort_reader(stdout_task);
            abort_reader(stderr_task);
            return Err(ConvertError::Timeout {
                secs: config.worker_timeout_secs,
            });
        }
    };

    debug!(
        "Worker finished with {} in {}ms ({} bytes stdout, {} bytes stderr)",
        status,
        start.elapsed().as_millis(),
        stdout.len(),
        stderr.len()
    );

    if !status.success() {
        let detail = if stderr.trim().is_empty() {
            "no diagnostic output was captured".to_string()
        } else {
            truncate_chars(stderr.trim(), config.max_diagnostic_chars)
        };
        return Err(ConvertError::WorkerExitError {
            status: status.to_string(),
            detail,
        });
    }

    let raw = parse_worker_output(&stdout).ok_or_else(|| ConvertError::MalformedWorkerOutput {
        raw: truncate_chars(&stdout, config.max_diagnostic_chars),
    })?;
    WorkerResult::from_raw(raw)
}

fn spawn_reader<R>(reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_tail(reader, MAX_CAPTURE_BYTES))
}

/// Read to EOF, keeping only the last `limit` bytes.
///
/// The result object is printed last, so the tail is the part worth keeping
/// when a worker floods its pipe.
async fn read_tail<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut discarded = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                // Compact in batches, not on every chunk.
                if kept.len() > limit.saturating_mul(2) {
                    let excess = kept.len() - limit;
                    kept.drain(..excess);
                    discarded += excess;
                }
            }
            Err(e) => {
                debug!("Worker pipe read failed: {}", e);
                break;
            }
        }
    }
    if kept.len() > limit {
        let excess = kept.len() - limit;
        kept.drain(..excess);
        discarded += excess;
    }
    if discarded > 0 {
        debug!("Discarded the first {} bytes of worker output", discarded);
    }
    String::from_utf8_lossy(&kept).into_owned()
}

async fn join_reader(task: Option<&mut JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort_reader(task: Option<JoinHandle<String>>) {
    if let Some(handle) = task {
        handle.abort();
    }
}

/// Extract the worker's result object from its captured stdout.
///
/// Strategy, in order:
/// 1. the last non-empty line parsed on its own;
/// 2. the span ending at the last `}`, starting at the earliest `{` before it
///    that yields a valid object (earliest first, so nested objects are kept whole).
fn parse_worker_output(output: &str) -> Option<RawWorkerResult> {
    if let Some(last_line) = output.lines().rev().find(|l| !l.trim().is_empty()) {
        if let Ok(parsed) = serde_json::from_str::<RawWorkerResult>(last_line.trim()) {
            return Some(parsed);
        }
    }

    let end = output.rfind('}')?;
    output[..end]
        .match_indices('{')
        .map(|(start, _)| start)
        .find_map(|start| serde_json::from_str::<RawWorkerResult>(&output[start..=end]).ok())
}

/// Truncate to at most `max` characters, marking the cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}… [truncated]", &s[..idx]),
        None => s.to_string(),
    }
}
