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

use hyper::client::HttpConnector;
use hyper::{Body, Client, Request};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::fallback;

/// Where a query's context passages ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSource {
    VectorStore,
    Fallback,
}

#[derive(Serialize)]
struct QueryPayload<'a> {
    query_texts: [&'a str; 1],
    n_results: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
}

/// Wraps "query top-k passages for question" against the vector store with
/// a timeout, HTTP-status classification, and an automatic fallback to the
/// keyword table. Never fails the request as a whole: retrieval failure
/// degrades to the fallback table, not to an error.
pub async fn retrieve(
    client: &Client<HttpConnector>,
    base_url: &str,
    question: &str,
    collection: &str,
    k: usize,
    timeout_secs: u64,
) -> (Vec<String>, RetrievalSource) {
    let url = format!("{}/collections/{}/query", base_url, collection);
    let payload = QueryPayload {
        query_texts: [question],
        n_results: k,
    };

    let body = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => {
            warn!("failed to serialize vector-store query payload: {}", e);
            return (fallback::lookup(question), RetrievalSource::Fallback);
        }
    };

    let req = match Request::builder()
        .method("POST")
        .uri(&url)
        .header("content-type", "application/json")
        .body(Body::from(body))
    {
        Ok(r) => r,
        Err(e) => {
            warn!("failed to build vector-store request for '{}': {}", url, e);
            return (fallback::lookup(question), RetrievalSource::Fallback);
        }
    };

    let call = timeout(Duration::from_secs(timeout_secs), client.request(req)).await;

    let resp = match call {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            warn!("vector store request to '{}' failed: {}", url, e);
            return (fallback::lookup(question), RetrievalSource::Fallback);
        }
        Err(_) => {
            warn!("vector store request to '{}' timed out after {}s", url, timeout_secs);
            return (fallback::lookup(question), RetrievalSource::Fallback);
        }
    };

    if !resp.status().is_success() {
        warn!(
            "vector store returned HTTP {} for '{}'; using fallback context",
            resp.status(),
            url
        );
        return (fallback::lookup(question), RetrievalSource::Fallback);
    }

    let bytes = match hyper::body::to_bytes(resp.into_body()).await {
        Ok(b) => b,
        Err(e) => {
            warn!("failed to read vector store response body: {}", e);
            return (fallback::lookup(question), RetrievalSource::Fallback);
        }
    };

    match serde_json::from_slice::<QueryResponse>(&bytes) {
        Ok(parsed) => {
            let passages = parsed.documents.into_iter().next().unwrap_or_default();
            (passages, RetrievalSource::VectorStore)
        }
        Err(e) => {
            warn!("failed to parse vector store response: {}", e);
            (fallback::lookup(question), RetrievalSource::Fallback)
        }
    }
}

/// `GET {base}{health_path}` health probe: healthy iff HTTP 200.
pub async fn probe_health(client: &Client<HttpConnector>, base_url: &str, health_path: &str, timeout_secs: u64) -> bool {
    let url = format!("{}{}", base_url, health_path);
    let req = match Request::builder().method("GET").uri(&url).body(Body::empty()) {
        Ok(r) => r,
        Err(_) => return false,
    };

    match timeout(Duration::from_secs(timeout_secs), client.request(req)).await {
        Ok(Ok(resp)) => resp.status().is_success(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_source_equality() {
        assert_eq!(RetrievalSource::VectorStore, RetrievalSource::VectorStore);
        assert_ne!(RetrievalSource::VectorStore, RetrievalSource::Fallback);
    }

    #[tokio::test]
    async fn retrieve_falls_back_when_unreachable() {
        let client = Client::new();
        let (passages, source) = retrieve(
            &client,
            "http://127.0.0.1:1",
            "tell me about machine learning",
            "rag_documents_collection",
            3,
            1,
        )
        .await;

        assert_eq!(source, RetrievalSource::Fallback);
        assert!(passages[0].contains("ML enables"));
    }
}
