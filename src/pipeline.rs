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

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::{llm, vector_store};
use crate::cache::{fingerprint, normalize_question, ResponseCache};
use crate::classifier::{classify, Bucket};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::http_pool::HttpPool;
use crate::metrics::Metrics;
use crate::models::ModelRegistry;

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `task_hint` override for the classifier, as accepted on `QueryRequest`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskHint {
    Simple,
    Fast,
    Balanced,
    Complex,
}

impl From<TaskHint> for Bucket {
    fn from(hint: TaskHint) -> Self {
        match hint {
            TaskHint::Simple => Bucket::Simple,
            TaskHint::Fast => Bucket::Fast,
            TaskHint::Balanced => Bucket::Balanced,
            TaskHint::Complex => Bucket::Complex,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub collection: Option<String>,
    pub k: Option<usize>,
    pub streaming: Option<bool>,
    pub task_hint: Option<TaskHint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub passages: Vec<String>,
    pub latency_seconds: f64,
    pub model_used: Option<String>,
    pub confidence: f64,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub cache_hit: bool,
    pub streaming: bool,
    pub tokens_per_second: Option<f64>,
}

impl QueryResult {
    fn invalid_input(question: String) -> Self {
        QueryResult {
            question,
            answer: String::new(),
            passages: Vec::new(),
            latency_seconds: 0.0,
            model_used: None,
            confidence: 0.0,
            success: false,
            error_kind: Some(ErrorKind::InvalidInput),
            cache_hit: false,
            streaming: false,
            tokens_per_second: None,
        }
    }
}

/// The end-to-end request path: classify -> route -> cache-lookup ->
/// retrieve -> generate -> cache-store -> respond. Owns no mutable state
/// of its own beyond what it borrows from the shared components below.
pub struct Orchestrator {
    pub cache: ResponseCache,
    pub models: ModelRegistry,
    pub metrics: Arc<Metrics>,
    pub vector_store_pool: HttpPool,
    pub llm_pool: HttpPool,
    pub config: Arc<Config>,
}

impl Orchestrator {
    pub async fn process_query(&self, request: QueryRequest) -> QueryResult {
        let trimmed = request.question.trim();
        if trimmed.is_empty() {
            return QueryResult::invalid_input(request.question);
        }

        let start = Instant::now();
        self.metrics.record_query_started();

        let bucket = request
            .task_hint
            .map(Bucket::from)
            .unwrap_or_else(|| classify(trimmed));
        let descriptor = self.models.select(bucket);
        self.models.mark_used(&descriptor, now_unix_ms());

        let collection = request
            .collection
            .unwrap_or_else(|| self.config.default_collection.clone());
        let k = self.config.clamp_k(request.k);

        let _vs_permit = self.vector_store_pool.acquire().await;
        let (passages, _source) = vector_store::retrieve(
            self.vector_store_pool.client(),
            &self.config.vector_store.base_url,
            trimmed,
            &collection,
            k,
            self.config.vector_store.timeout_secs,
        )
        .await;
        drop(_vs_permit);

        let normalized = normalize_question(trimmed);
        let key = fingerprint(&normalized, &passages);

        if let Some(cached_answer) = self.cache.get(&key).await {
            let latency = start.elapsed().as_secs_f64();
            self.metrics.record_success(latency, true);
            info!("cache hit for query, {:.3}s", latency);

            return QueryResult {
                question: request.question,
                answer: cached_answer,
                passages,
                latency_seconds: latency,
                model_used: Some(descriptor.name.clone()),
                confidence: 0.95,
                success: true,
                error_kind: None,
                cache_hit: true,
                streaming: false,
                tokens_per_second: None,
            };
        }

        self.models
            .ensure_loaded(&descriptor, &self.llm_pool, &self.config.llm.base_url)
            .await;

        // The original string is passed verbatim to the LLM; trimming is
        // only for cache-key normalization, not for the prompt itself.
        let prompt = llm::build_prompt(&request.question, &passages);
        let streaming = request.streaming.unwrap_or(false);

        let (answer, tokens_per_second) = if streaming {
            self.metrics.record_streaming();
            let _llm_permit = self.llm_pool.acquire().await;
            let stream = llm::generate_streaming(
                self.llm_pool.client(),
                &self.config.llm.base_url,
                &descriptor.name,
                &prompt,
                self.config.llm.timeout_secs,
            )
            .await;
            let fragments: Vec<String> = stream.collect().await;
            (fragments.concat(), 0.0)
        } else {
            let _llm_permit = self.llm_pool.acquire().await;
            llm::generate_blocking(
                self.llm_pool.client(),
                &self.config.llm.base_url,
                &descriptor.name,
                &prompt,
                self.config.llm.timeout_secs,
            )
            .await
        };

        let latency = start.elapsed().as_secs_f64();

        if !answer.is_empty() && !answer.starts_with("Error") {
            self.cache.put(key, answer.clone()).await;
            self.metrics.record_success(latency, false);

            let confidence = (answer.chars().count() as f64 / 100.0).min(0.9);

            QueryResult {
                question: request.question,
                answer,
                passages,
                latency_seconds: latency,
                model_used: Some(descriptor.name.clone()),
                confidence,
                success: true,
                error_kind: None,
                cache_hit: false,
                streaming,
                tokens_per_second: Some(tokens_per_second),
            }
        } else {
            self.metrics.record_failure(latency);

            QueryResult {
                question: request.question,
                answer: String::new(),
                passages,
                latency_seconds: latency,
                model_used: Some(descriptor.name.clone()),
                confidence: 0.0,
                success: false,
                error_kind: Some(ErrorKind::GenerationError),
                cache_hit: false,
                streaming,
                tokens_per_second: Some(tokens_per_second),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            app_id: "test".into(),
            vector_store: ServiceSettings {
                base_url: "http://127.0.0.1:1".into(),
                timeout_secs: 1,
                health_path: "/heartbeat".into(),
            },
            llm: ServiceSettings {
                base_url: "http://127.0.0.1:1".into(),
                timeout_secs: 1,
                health_path: "/api/tags".into(),
            },
            cache: crate::config::CacheSettings {
                capacity: 100,
                default_k: 3,
                max_k: 10,
            },
            models: crate::config::ModelSettings::default(),
            default_collection: "rag_documents_collection".into(),
            health_check_interval_secs: 30,
            max_concurrent_requests: 10,
            pool_max_idle_per_host: 10,
            ingress_port: 8080,
            admin_port: 8081,
        })
    }

    fn test_orchestrator() -> Orchestrator {
        let config = test_config();
        Orchestrator {
            cache: ResponseCache::new(config.cache.capacity),
            models: ModelRegistry::new("ultra-fast", "fast", "quality", "ultra-quality"),
            metrics: Arc::new(Metrics::new(0)),
            vector_store_pool: HttpPool::new(config.max_concurrent_requests, config.pool_max_idle_per_host),
            llm_pool: HttpPool::new(config.max_concurrent_requests, config.pool_max_idle_per_host),
            config,
        }
    }

    #[tokio::test]
    async fn empty_question_is_invalid_input_with_zero_latency() {
        let orch = test_orchestrator();
        let result = orch
            .process_query(QueryRequest {
                question: "   ".to_string(),
                collection: None,
                k: None,
                streaming: None,
                task_hint: None,
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidInput));
        assert_eq!(result.latency_seconds, 0.0);
    }

    #[tokio::test]
    async fn unreachable_downstreams_yield_generation_error_with_fallback_passages() {
        let orch = test_orchestrator();
        let result = orch
            .process_query(QueryRequest {
                question: "Explain machine learning".to_string(),
                collection: None,
                k: None,
                streaming: None,
                task_hint: None,
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::GenerationError));
        assert_eq!(result.answer, "");
        assert!(!result.passages.is_empty());
        assert!(result.passages[0].contains("ML enables"));
    }

    #[tokio::test]
    async fn latency_is_never_negative() {
        let orch = test_orchestrator();
        let result = orch
            .process_query(QueryRequest {
                question: "What is Docker?".to_string(),
                collection: None,
                k: None,
                streaming: None,
                task_hint: None,
            })
            .await;

        assert!(result.latency_seconds >= 0.0);
    }

    #[tokio::test]
    async fn task_hint_overrides_classifier_bucket() {
        let orch = test_orchestrator();
        let result = orch
            .process_query(QueryRequest {
                question: "a plain question".to_string(),
                collection: None,
                k: None,
                streaming: None,
                task_hint: Some(TaskHint::Complex),
            })
            .await;

        assert_eq!(result.model_used, Some("ultra-quality".to_string()));
    }

    #[tokio::test]
    async fn k_above_hard_cap_is_clamped() {
        let orch = test_orchestrator();
        // k=999 should be clamped to max_k=10 before being sent downstream;
        // we can't observe the outbound payload directly here without a
        // server, so we assert the call still completes rather than
        // hanging or panicking on an out-of-range value.
        let result = orch
            .process_query(QueryRequest {
                question: "What is Docker?".to_string(),
                collection: None,
                k: Some(999),
                streaming: None,
                task_hint: None,
            })
            .await;

        assert!(result.latency_seconds >= 0.0);
    }
}
