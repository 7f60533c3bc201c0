//! Base64 handling for inline payloads in both directions.
//!
//! Callers that cannot share a filesystem with the server send documents as
//! base64 and expect results the same way. Some clients wrap the payload in
//! a `data:` URI, so the prefix is accepted and stripped on the way in.

use crate::error::ConvertError;
use crate::output::InlinePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Decode an inline request payload into raw bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, ConvertError> {
    let trimmed = payload.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| {
                ConvertError::InvalidInput("data URI payload is not base64-encoded".into())
            })?,
        None => trimmed,
    };
    // Line-wrapped base64 is common when payloads are pasted.
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ConvertError::InvalidInput(format!("pdf_base64 is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ConvertError::InvalidInput("pdf_base64 decoded to zero bytes".into()));
    }
    debug!("Decoded inline payload → {} bytes", bytes.len());
    Ok(bytes)
}

/// Wrap `bytes` as an inline response item named `file_name`.
pub fn encode_payload(file_name: &str, bytes: &[u8]) -> InlinePayload {
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} → {} bytes base64", file_name, data.len());
    InlinePayload {
        file_name: file_name.to_string(),
        mime_type: mime_for_path(Path::new(file_name)).to_string(),
        data,
    }
}

/// MIME type for the conversion outputs this server produces.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("zip") => "application/zip",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        _ => "application/octet-stream",
    }
}
