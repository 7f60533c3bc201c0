//! Result types handed back across the tool-call boundary.
//!
//! [`Materialized`] is what the orchestrator produces for one successful
//! conversion; [`ToolResponse`] is its wire shape (a text item plus an
//! optional inline-data item), and is also used for failures so the outer
//! protocol layer never sees a raw error.

use crate::error::Degradation;
use serde::{Deserialize, Serialize};

/// Encoded file bytes embedded directly in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePayload {
    /// Suggested file name, e.g. `report.zip`.
    pub file_name: String,
    /// MIME type derived from the file extension.
    pub mime_type: String,
    /// Standard base64 of the file contents.
    pub data: String,
}

/// Outcome of the output materializer for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// Worker summary plus location or download information.
    pub message: String,
    /// Present when the result could not be delivered by reference.
    pub inline: Option<InlinePayload>,
    /// Non-fatal delivery problems encountered on the way.
    pub degradations: Vec<Degradation>,
}

/// A single content item of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
}

/// Binary resource embedded in a [`ToolContent::Resource`] item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub blob: String,
}

/// Response of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Failure response carrying a descriptive message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// The human-readable message of the first text item.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Whether a second, inline-data item is present.
    pub fn has_inline_data(&self) -> bool {
        self.content
            .iter()
            .any(|c| !matches!(c, ToolContent::Text { .. }))
    }
}

impl From<Materialized> for ToolResponse {
    fn from(m: Materialized) -> Self {
        let mut content = vec![ToolContent::Text { text: m.message }];
        if let Some(payload) = m.inline {
            if payload.mime_type.starts_with("image/") {
                content.push(ToolContent::Image {
                    data: payload.data,
                    mime_type: payload.mime_type,
                });
            } else {
                content.push(ToolContent::Resource {
                    resource: EmbeddedResource {
                        uri: format!("file:///{}", payload.file_name),
                        mime_type: payload.mime_type,
                        blob: payload.data,
                    },
                });
            }
        }
        Self {
            content,
            is_error: false,
        }
    }
}
