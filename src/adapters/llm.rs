// Copyright (C) 2025 Matías Salinas (support@fenden.com)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use futures::Stream;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Stop sequences the LLM runtime halts generation on, per the ingress
/// prompt contract.
const STOP_SEQUENCES: &[&str] = &["\n\n", "Question:", "Context:"];
const NUM_PREDICT_BLOCKING: u32 = 50;
const NUM_PREDICT_STREAMING: u32 = 100;

#[derive(Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [&'a str]>,
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u64>,
    eval_duration: Option<u64>,
}

/// Builds the exact prompt the orchestration pipeline sends downstream:
/// `"Context: " + join(passages, "\n") + "\n\nQuestion: " + question +
/// "\nAnswer:"`. `passages` being empty renders as "No relevant context
/// found."
pub fn build_prompt(question: &str, passages: &[String]) -> String {
    let context_text = if passages.is_empty() {
        "No relevant context found.".to_string()
    } else {
        passages.join("\n")
    };
    format!("Context: {}\n\nQuestion: {}\nAnswer:", context_text, question)
}

/// Non-streaming generation. Returns `(text, tokens_per_second)`. On any
/// transport error or non-200 response, returns an error-prefixed string
/// and `0.0` rather than a Rust `Err` — the orchestrator treats non-empty
/// error strings as a generation failure, not an exception.
pub async fn generate_blocking(
    client: &Client<HttpConnector>,
    base_url: &str,
    model: &str,
    prompt: &str,
    timeout_secs: u64,
) -> (String, f64) {
    let payload = GeneratePayload {
        model,
        prompt,
        stream: false,
        options: GenerateOptions {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: NUM_PREDICT_BLOCKING,
            stop: Some(STOP_SEQUENCES),
        },
    };

    let url = format!("{}/api/generate", base_url);
    let body = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => return (format!("Error generating response: {}", e), 0.0),
    };

    let req = match Request::builder()
        .method("POST")
        .uri(&url)
        .header("content-type", "application/json")
        .body(Body::from(body))
    {
        Ok(r) => r,
        Err(e) => return (format!("Error generating response: {}", e), 0.0),
    };

    let resp = match timeout(Duration::from_secs(timeout_secs), client.request(req)).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => return (format!("Error generating response: {}", e), 0.0),
        Err(_) => {
            return (
                format!("Error generating response: timed out after {}s", timeout_secs),
                0.0,
            )
        }
    };

    if !resp.status().is_success() {
        return (
            format!("Error generating response: HTTP {}", resp.status()),
            0.0,
        );
    }

    let bytes = match hyper::body::to_bytes(resp.into_body()).await {
        Ok(b) => b,
        Err(e) => return (format!("Error generating response: {}", e), 0.0),
    };

    let parsed: GenerateResponse = match serde_json::from_slice(&bytes) {
        Ok(p) => p,
        Err(e) => return (format!("Error generating response: {}", e), 0.0),
    };

    let tokens_per_second = match (parsed.eval_count, parsed.eval_duration) {
        (Some(count), Some(duration_ns)) if duration_ns > 0 => {
            count as f64 / (duration_ns as f64 / 1_000_000_000.0)
        }
        _ => 0.0,
    };

    (parsed.response, tokens_per_second)
}

/// Streaming generation: produces a lazy, finite, non-restartable sequence
/// of UTF-8 text fragments terminated when the underlying transport
/// closes. Dropping the stream before exhaustion cancels the upstream
/// request (the hyper body is dropped, closing the connection).
pub async fn generate_streaming(
    client: &Client<HttpConnector>,
    base_url: &str,
    model: &str,
    prompt: &str,
    timeout_secs: u64,
) -> impl Stream<Item = String> {
    let payload = GeneratePayload {
        model,
        prompt,
        stream: true,
        options: GenerateOptions {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: NUM_PREDICT_STREAMING,
            stop: None,
        },
    };

    let url = format!("{}/api/generate", base_url);
    let body = serde_json::to_vec(&payload).unwrap_or_default();

    let req = Request::builder()
        .method("POST")
        .uri(&url)
        .header("content-type", "application/json")
        .body(Body::from(body));

    let body_stream = match req {
        Ok(req) => match timeout(Duration::from_secs(timeout_secs), client.request(req)).await {
            Ok(Ok(resp)) if resp.status().is_success() => Some(resp.into_body()),
            Ok(Ok(resp)) => {
                warn!("streaming generate returned HTTP {}", resp.status());
                None
            }
            Ok(Err(e)) => {
                warn!("streaming generate request failed: {}", e);
                None
            }
            Err(_) => {
                warn!("streaming generate request timed out after {}s", timeout_secs);
                None
            }
        },
        Err(e) => {
            warn!("failed to build streaming generate request: {}", e);
            None
        }
    };

    ndjson_response_fragments(body_stream)
}

/// Adapts a newline-delimited-JSON hyper body (each line `{"response":
/// "..."}`) into a stream of plain text fragments, buffering partial
/// lines across chunk boundaries.
fn ndjson_response_fragments(body: Option<Body>) -> impl Stream<Item = String> {
    use futures::StreamExt;

    let state = (body, String::new());

    futures::stream::unfold(state, |(body, mut buf)| async move {
        let mut body = body?;

        loop {
            if let Some(pos) = buf.find('\n') {
                let line = buf[..pos].to_string();
                buf.drain(..=pos);
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(fragment) = parse_ndjson_line(&line) {
                    return Some((fragment, (Some(body), buf)));
                }
                continue;
            }

            match body.next().await {
                Some(Ok(chunk)) => {
                    buf.push_str(&String::from_utf8_lossy(&chunk));
                }
                Some(Err(e)) => {
                    warn!("error reading streamed generation chunk: {}", e);
                    return None;
                }
                None => {
                    if buf.trim().is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buf);
                    return parse_ndjson_line(&line).map(|fragment| (fragment, (None, buf)));
                }
            }
        }
    })
}

fn parse_ndjson_line(line: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Chunk {
        #[serde(default)]
        response: String,
    }

    match serde_json::from_str::<Chunk>(line) {
        Ok(c) => Some(c.response),
        Err(e) => {
            warn!("failed to parse streamed generation line: {}", e);
            None
        }
    }
}

/// Issues a trivial, throwaway generation solely to force the LLM runtime
/// to load `model` into memory. Goes through the caller's shared
/// `client` (the same `HttpPool`-owned connection pool every other LLM
/// call uses) instead of opening an ad hoc connection.
pub async fn warm_up(client: &Client<HttpConnector>, base_url: &str, model: &str) -> Result<(), String> {
    let payload = GeneratePayload {
        model,
        prompt: "Hello",
        stream: false,
        options: GenerateOptions {
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 10,
            stop: None,
        },
    };

    let url = format!("{}/api/generate", base_url);
    let body = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;
    let req = Request::builder()
        .method("POST")
        .uri(&url)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .map_err(|e| e.to_string())?;

    match timeout(Duration::from_secs(10), client.request(req)).await {
        Ok(Ok(resp)) if resp.status().is_success() => Ok(()),
        Ok(Ok(resp)) => Err(format!("HTTP {}", resp.status())),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("timed out".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn build_prompt_renders_empty_passages_as_placeholder() {
        let prompt = build_prompt("What is Docker?", &[]);
        assert_eq!(
            prompt,
            "Context: No relevant context found.\n\nQuestion: What is Docker?\nAnswer:"
        );
    }

    #[test]
    fn build_prompt_joins_passages_with_newlines() {
        let passages = vec!["p1".to_string(), "p2".to_string()];
        let prompt = build_prompt("q", &passages);
        assert_eq!(prompt, "Context: p1\np2\n\nQuestion: q\nAnswer:");
    }

    #[tokio::test]
    async fn generate_blocking_reports_error_when_unreachable() {
        let client = Client::new();
        let (text, tps) = generate_blocking(&client, "http://127.0.0.1:1", "model", "prompt", 1).await;
        assert!(text.starts_with("Error generating response:"));
        assert_eq!(tps, 0.0);
    }

    #[tokio::test]
    async fn warm_up_fails_gracefully_when_unreachable() {
        let client = Client::new();
        let result = warm_up(&client, "http://127.0.0.1:1", "model").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ndjson_fragments_yields_nothing_without_a_body() {
        let stream = ndjson_response_fragments(None);
        let collected: Vec<String> = stream.collect().await;
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn ndjson_fragments_reassembles_lines_split_across_chunks() {
        // Simulate the NDJSON body arriving in three raw chunks, with a
        // JSON line's closing brace split across a chunk boundary.
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"{\"response\":\"Hel")),
            Ok(bytes::Bytes::from_static(b"lo\"}\n{\"response\":\" world\"}\n")),
            Ok(bytes::Bytes::from_static(b"{\"response\":\"!\"}")),
        ];
        let body = Body::wrap_stream(futures::stream::iter(chunks));

        let stream = ndjson_response_fragments(Some(body));
        let fragments: Vec<String> = stream.collect().await;

        assert_eq!(fragments, vec!["Hello", " world", "!"]);
    }

    #[test]
    fn parse_ndjson_line_extracts_response_field() {
        let line = r#"{"response":"hello","done":false}"#;
        assert_eq!(parse_ndjson_line(line), Some("hello".to_string()));
    }

    #[test]
    fn parse_ndjson_line_rejects_malformed_json() {
        assert_eq!(parse_ndjson_line("not json"), None);
    }
}
