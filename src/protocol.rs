//! JSON-RPC 2.0 framing and the tool-protocol methods.
//!
//! The types mirror the JSON-RPC 2.0 objects and are transport-agnostic:
//! stdio feeds one line per request, the streamed transport one POST body
//! per request. [`McpHandler`] answers `initialize`, `ping`, `tools/list`
//! and `tools/call`; notifications get no response.

use crate::config::ConversionAction;
use crate::convert::{Orchestrator, ToolArguments};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision announced when the client does not ask for one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// `id` may be a string, a number or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
    Null,
}

/// JSON-RPC 2.0 request. A missing `id` makes it a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_owned()
}

impl Request {
    pub fn call(id: Id, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 response. Exactly one of `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    pub id: Id,
}

impl Response {
    pub fn success(id: Id, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn fail(id: Id, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(Error {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// Decode one frame. Syntax errors and non-request objects become the
/// matching error response, ready to send.
pub fn parse_request(frame: &str) -> Result<Request, Response> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| Response::fail(Id::Null, PARSE_ERROR, format!("Parse error: {e}")))?;
    let id = value
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value::<Id>(v).ok())
        .unwrap_or(Id::Null);
    serde_json::from_value(value)
        .map_err(|e| Response::fail(id, INVALID_REQUEST, format!("Invalid request: {e}")))
}

// ── Method dispatch ──────────────────────────────────────────────────────

/// Answers protocol methods on behalf of one server (shared by all sessions).
#[derive(Clone)]
pub struct McpHandler {
    orchestrator: Orchestrator,
}

impl McpHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Handle one raw frame; `None` means nothing is sent back.
    pub async fn handle_frame(&self, frame: &str) -> Option<Response> {
        match parse_request(frame) {
            Ok(request) => self.handle(request).await,
            Err(response) => {
                warn!("Rejected frame: {:?}", response.error.as_ref().map(|e| &e.message));
                Some(response)
            }
        }
    }

    /// Handle one decoded request.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        debug!(method = %request.method, "Handling request");
        let Some(id) = request.id else {
            // Notifications (`notifications/initialized`, `notifications/cancelled`, …)
            debug!("Notification {} ignored", request.method);
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => Response::success(id, initialize_result(request.params.as_ref())),
            "ping" => Response::success(id, json!({})),
            "tools/list" => Response::success(id, tools_list()),
            "tools/call" => match request.params {
                Some(Value::Object(mut params)) => {
                    let name = match params.remove("name") {
                        Some(Value::String(n)) => n,
                        _ => {
                            return Some(Response::fail(
                                id,
                                INVALID_PARAMS,
                                "tools/call requires a string 'name'",
                            ))
                        }
                    };
                    let arguments = params.remove("arguments").unwrap_or(Value::Null);
                    let result = self.orchestrator.call_tool(&name, arguments).await;
                    match serde_json::to_value(&result) {
                        Ok(v) => Response::success(id, v),
                        Err(e) => Response::fail(id, INTERNAL_ERROR, e.to_string()),
                    }
                }
                _ => Response::fail(id, INVALID_PARAMS, "tools/call requires an object"),
            },
            other => Response::fail(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };
        Some(response)
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// One entry per conversion action, all sharing the argument schema.
pub fn tools_list() -> Value {
    let schema = schemars::schema_for!(ToolArguments);
    let tools: Vec<Value> = ConversionAction::ALL
        .iter()
        .map(|action| {
            json!({
                "name": action.as_str(),
                "description": action.description(),
                "inputSchema": schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn handler() -> McpHandler {
        McpHandler::new(Orchestrator::new(ServerConfig::default()))
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let resp = handler().handle_frame("{not json").await.unwrap();
        assert_eq!(resp.id, Id::Null);
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn object_without_method_is_invalid_request() {
        let resp = handler().handle_frame(r#"{"jsonrpc":"2.0","id":7}"#).await.unwrap();
        assert_eq!(resp.id, Id::Number(7));
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let resp = handler()
            .handle(Request::call(Id::String("a".into()), "resources/list", None))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let frame = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(handler().handle_frame(frame).await.is_none());
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let req = Request::call(
            Id::Number(1),
            "initialize",
            Some(json!({"protocolVersion": "2025-03-26"})),
        );
        let resp = handler().handle(req).await.unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "pdf-convert-mcp");
    }

    #[test]
    fn tools_list_publishes_every_action() {
        let list = tools_list();
        let names: Vec<&str> = list["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["pdf_to_docx", "pdf_to_excel", "pdf_to_ppt", "pdf_to_jpg"]);
        assert!(list["tools"][0]["inputSchema"]["properties"]["pdf_base64"].is_object());
    }

    #[tokio::test]
    async fn tool_failures_are_results_not_errors() {
        let req = Request::call(
            Id::Number(3),
            "tools/call",
            Some(json!({"name": "pdf_to_docx", "arguments": {}})),
        );
        let resp = handler().handle(req).await.unwrap();
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["isError"], true);
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_params() {
        let req = Request::call(Id::Number(4), "tools/call", Some(json!({"arguments": {}})));
        let resp = handler().handle(req).await.unwrap();
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }
}
