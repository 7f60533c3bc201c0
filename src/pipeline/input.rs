//! Input resolution: normalise a path, URL, or inline payload to a local file.
//!
//! The worker only understands local paths. Local paths are used in place;
//! URLs and inline payloads are written to a uniquely named file in the
//! scratch directory and wrapped in a [`ScratchFile`] so they disappear when
//! the tool call finishes, whatever the outcome.
//!
//! Local paths are never checked for existence here beyond the search
//! heuristic: a path that cannot be found is passed through unchanged and the
//! worker reports the not-found error, so there is exactly one wording for it.

use crate::config::ServerConfig;
use crate::error::ConvertError;
use crate::pipeline::cleanup::ScratchFile;
use crate::pipeline::encode::decode_payload;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Characters that are illegal in file names on at least one common platform.
static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));

const FALLBACK_FILENAME: &str = "downloaded.pdf";

/// Which of the three mutually exclusive input variants the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Local file path (possibly quoted, possibly just a file name).
    Path(String),
    /// HTTP/HTTPS URL to download.
    Url(String),
    /// Base64 document bytes.
    Inline(String),
}

impl InputSource {
    /// Pick the single supplied variant.
    ///
    /// Blank strings count as absent. Zero or several variants is an
    /// [`ConvertError::InvalidInput`].
    pub fn select(
        path: Option<&str>,
        url: Option<&str>,
        inline: Option<&str>,
    ) -> Result<Self, ConvertError> {
        let present = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);
        let candidates = [
            present(path).map(InputSource::Path),
            present(url).map(InputSource::Url),
            present(inline).map(InputSource::Inline),
        ];
        let mut supplied = candidates.into_iter().flatten();
        match (supplied.next(), supplied.next()) {
            (Some(source), None) => Ok(source),
            (None, _) => Err(ConvertError::InvalidInput(
                "provide one of pdf_path, pdf_url, or pdf_base64".into(),
            )),
            (Some(_), Some(_)) => Err(ConvertError::InvalidInput(
                "pdf_path, pdf_url, and pdf_base64 are mutually exclusive; provide only one"
                    .into(),
            )),
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputSource::Path(_) => "path",
            InputSource::Url(_) => "url",
            InputSource::Inline(_) => "inline",
        }
    }
}

/// The resolved input: a caller-owned local path or a scratch file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file (or an unresolved pass-through path).
    Local(PathBuf),
    /// Input was downloaded or decoded into the scratch directory.
    /// Dropping this variant deletes the file.
    Temporary(ScratchFile),
}

impl ResolvedInput {
    /// Get the path to hand to the worker regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary(f) => f.path(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ResolvedInput::Temporary(_))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the selected input variant to a local file.
pub async fn resolve_input(
    source: &InputSource,
    config: &ServerConfig,
) -> Result<ResolvedInput, ConvertError> {
    match source {
        InputSource::Path(raw) => Ok(resolve_local(raw, &search_dirs())),
        InputSource::Url(url) => {
            download_url(url, &config.scratch_dir, config.download_timeout_secs).await
        }
        InputSource::Inline(payload) => {
            let bytes = decode_payload(payload)?;
            let file = ScratchFile::write(&config.scratch_dir, "inline-", ".pdf", &bytes).await?;
            info!("Inline payload written to: {}", file.path().display());
            Ok(ResolvedInput::Temporary(file))
        }
    }
}

/// Directories searched, in order, for a bare file name that was not found as given.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs_list = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs_list.push(cwd.clone());
        for sub in ["test", "uploads", "files"] {
            dirs_list.push(cwd.join(sub));
        }
    }
    dirs_list.extend(
        [dirs::download_dir(), dirs::document_dir(), dirs::desktop_dir()]
            .into_iter()
            .flatten(),
    );
    dirs_list.push(std::env::temp_dir());
    dirs_list
}

/// Strip the quote characters that copy-pasting a path often leaves behind.
pub fn clean_path_arg(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”' | '‘' | '’'))
        .trim()
}

/// Resolve a local path: exact match first, then basename search, then pass-through.
pub fn resolve_local(raw: &str, search: &[PathBuf]) -> ResolvedInput {
    let cleaned = PathBuf::from(clean_path_arg(raw));

    if cleaned.exists() {
        debug!("Resolved local PDF: {}", cleaned.display());
        return ResolvedInput::Local(cleaned);
    }

    if let Some(name) = cleaned.file_name() {
        if let Some(found) = search
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
        {
            info!(
                "Resolved '{}' by file name to: {}",
                cleaned.display(),
                found.display()
            );
            return ResolvedInput::Local(found);
        }
    }

    debug!(
        "'{}' not found locally; passing through to the worker",
        cleaned.display()
    );
    ResolvedInput::Local(cleaned)
}

/// Download a URL into the scratch directory.
async fn download_url(
    url: &str,
    scratch_dir: &Path,
    timeout_secs: u64,
) -> Result<ResolvedInput, ConvertError> {
    if !is_url(url) {
        return Err(ConvertError::InvalidInput(format!(
            "pdf_url must be an http:// or https:// URL, got '{url}'"
        )));
    }
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;
    let filename = filename_from_url(url);
    let file = ScratchFile::write(scratch_dir, "download-", &format!("-{filename}"), &bytes).await?;

    info!(
        "Downloaded {} bytes to: {}",
        bytes.len(),
        file.path().display()
    );
    Ok(ResolvedInput::Temporary(file))
}

/// Derive a safe file name from the URL path, falling back to a generic name.
pub fn filename_from_url(url: &str) -> String {
    let last_segment = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    match last_segment {
        Some(last) if last.to_ascii_lowercase().ends_with(".pdf") && last.len() > 4 => {
            sanitize_filename(&last)
        }
        _ => FALLBACK_FILENAME.to_string(),
    }
}

/// Replace characters that are illegal in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    ILLEGAL_FILENAME_CHARS.replace_all(name, "_").into_owned()
}
