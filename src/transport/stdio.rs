//! Single-session pipe transport: JSON-RPC frames, one per line, on
//! stdin/stdout.
//!
//! Each request runs on its own task so a slow conversion never blocks a
//! `ping`. A single writer task owns the output so responses are never
//! interleaved mid-line; they are written in completion order.

use crate::protocol::{McpHandler, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Serve on the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(handler: McpHandler) -> std::io::Result<()> {
    serve(handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve frames from `input`, writing responses to `output`.
///
/// Returns once input is exhausted and every in-flight request has answered.
pub async fn serve<R, W>(handler: McpHandler, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Response>(64);
    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_vec(&response) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to encode response: {}", e);
                    continue;
                }
            };
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!("Serving on stdio");
    let mut in_flight = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let handler = handler.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = handler.handle_frame(&line).await {
                if tx.send(response).await.is_err() {
                    debug!("Output closed; dropping response");
                }
            }
        });
        // Reap finished tasks so the set does not grow with the session.
        while in_flight.try_join_next().is_some() {}
    }

    debug!("Input closed; waiting for {} in-flight requests", in_flight.len());
    while in_flight.join_next().await.is_some() {}
    drop(tx);

    match writer.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::convert::Orchestrator;
    use serde_json::Value;

    async fn run(input: &str) -> Vec<Value> {
        let handler = McpHandler::new(Orchestrator::new(ServerConfig::default()));
        let (client, server) = tokio::io::duplex(64 * 1024);
        serve(handler, input.as_bytes(), server).await.unwrap();

        let mut out = String::new();
        let mut reader = BufReader::new(client);
        while reader.read_line(&mut out).await.unwrap() > 0 {}
        out.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut responses = run(input).await;
        responses.sort_by_key(|r| r["id"].as_i64());
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn bad_line_gets_parse_error_and_session_continues() {
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n";
        let responses = run(input).await;
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().any(|r| r["error"]["code"] == -32700));
        assert!(responses.iter().any(|r| r["id"] == 9));
    }
}
