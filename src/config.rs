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

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{error::Error, fs};

/// Settings for an HTTP-backed downstream collaborator (vector store or
/// LLM runtime): where it lives, how long we wait for it, and where its
/// health endpoint is.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Path appended to `base_url` for health probes (e.g. `/heartbeat`).
    pub health_path: String,
}

/// The four LLM variants the model registry routes between, one per
/// quality tier. Defaults to the single quantized model the original
/// deployment had available for every tier; production configs are
/// expected to point each tier at a distinct model once more are on hand.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelSettings {
    #[serde(default = "default_model_name")]
    pub ultra_fast: String,
    #[serde(default = "default_model_name")]
    pub fast: String,
    #[serde(default = "default_model_name")]
    pub quality: String,
    #[serde(default = "default_model_name")]
    pub ultra_quality: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            ultra_fast: default_model_name(),
            fast: default_model_name(),
            quality: default_model_name(),
            ultra_quality: default_model_name(),
        }
    }
}

fn default_model_name() -> String {
    "llama3.1:8b-instruct-q5_K_M".to_string()
}

/// Cache-related settings: capacity and retrieval bounds.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Default number of passages to retrieve when the request omits `k`.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Hard cap on `k` regardless of what the request asks for.
    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            capacity: default_cache_capacity(),
            default_k: default_k(),
            max_k: default_max_k(),
        }
    }
}

fn default_cache_capacity() -> usize {
    2000
}

fn default_k() -> usize {
    3
}

fn default_max_k() -> usize {
    10
}

fn default_collection() -> String {
    "rag_documents_collection".to_string()
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    200
}

fn default_pool_per_host() -> usize {
    50
}

fn default_ingress_port() -> u16 {
    8080
}

fn default_admin_port() -> u16 {
    8081
}

/// Main configuration structure loaded from a YAML file.
/// Defines all tunable behavior of the orchestrator.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Application identifier, used for namespacing logs and metrics.
    pub app_id: String,

    /// Vector-store HTTP adapter settings.
    pub vector_store: ServiceSettings,

    /// LLM runtime HTTP adapter settings.
    pub llm: ServiceSettings,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// LLM variants behind each quality tier.
    #[serde(default)]
    pub models: ModelSettings,

    /// Default collection name used when a request omits `collection`.
    #[serde(default = "default_collection")]
    pub default_collection: String,

    /// Health-probe interval in seconds.
    #[serde(default = "default_health_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Max concurrent outbound requests to each downstream service.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Max idle keep-alive connections held per downstream host.
    #[serde(default = "default_pool_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Port the ingress `/query` API listens on.
    #[serde(default = "default_ingress_port")]
    pub ingress_port: u16,

    /// Port the admin/metrics API listens on.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
}

/// Global, lazily-initialized config object shared across the application.
pub static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    /// Parses configuration from a YAML file, applying environment-variable
    /// overrides for the downstream base URLs per the external-interfaces
    /// contract (defaults: vector store at `localhost:8000`, LLM at
    /// `localhost:11434` — applied in the YAML file itself, env vars take
    /// precedence when set).
    ///
    /// # Returns
    /// - `Ok(Config)` if parsing and validation succeed.
    /// - `Err(Box<dyn Error>)` if the file is missing, malformed, or invalid.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        let mut parsed: Config = serde_yaml::from_str(&contents)?;

        if let Ok(url) = std::env::var("VECTOR_STORE_URL") {
            parsed.vector_store.base_url = url;
        }
        if let Ok(url) = std::env::var("LLM_URL") {
            parsed.llm.base_url = url;
        }

        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.app_id.trim().is_empty() {
            return Err("app_id is required and cannot be empty.".into());
        }

        if self.cache.capacity == 0 {
            return Err("cache.capacity must be greater than 0.".into());
        }

        if self.cache.max_k == 0 {
            return Err("cache.max_k must be greater than 0.".into());
        }

        if self.cache.default_k > self.cache.max_k {
            return Err("cache.default_k cannot exceed cache.max_k.".into());
        }

        if self.vector_store.base_url.trim().is_empty() {
            return Err("vector_store.base_url is required.".into());
        }

        if self.llm.base_url.trim().is_empty() {
            return Err("llm.base_url is required.".into());
        }

        Ok(())
    }

    /// Clamps a requested `k` to the configured hard cap (default 10),
    /// falling back to `cache.default_k` when the request omits one.
    pub fn clamp_k(&self, requested: Option<usize>) -> usize {
        let k = requested.unwrap_or(self.cache.default_k);
        k.min(self.cache.max_k)
    }
}
