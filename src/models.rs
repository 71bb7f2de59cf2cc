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

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::llm;
use crate::classifier::Bucket;
use crate::http_pool::HttpPool;

/// Closed set of quality/latency tiers an LLM variant can occupy.
/// Represented as a tagged enum rather than string lookups, per the
/// registry's "enum-like model tiers via string keys" redesign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    UltraFast,
    Fast,
    Quality,
    UltraQuality,
}

/// A single loadable LLM variant tracked by the registry.
pub struct ModelDescriptor {
    pub name: String,
    pub quality_tier: QualityTier,
    loaded: AtomicBool,
    last_use_unix_ms: AtomicI64,
}

impl ModelDescriptor {
    fn new(name: &str, quality_tier: QualityTier) -> Self {
        ModelDescriptor {
            name: name.to_string(),
            quality_tier,
            loaded: AtomicBool::new(false),
            last_use_unix_ms: AtomicI64::new(0),
        }
    }

    pub fn loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn last_use_unix_ms(&self) -> i64 {
        self.last_use_unix_ms.load(Ordering::Acquire)
    }

    fn mark_used(&self, now_unix_ms: i64) {
        self.last_use_unix_ms.store(now_unix_ms, Ordering::Release);
    }
}

/// Holds a fixed ordered set of four [`ModelDescriptor`]s, one per quality
/// tier, and a process-wide serialization guard for warm-ups.
pub struct ModelRegistry {
    ultra_fast: Arc<ModelDescriptor>,
    fast: Arc<ModelDescriptor>,
    quality: Arc<ModelDescriptor>,
    ultra_quality: Arc<ModelDescriptor>,
    /// Per-process (never per-name) load guard: keeps the implementation
    /// simple and avoids a thundering herd of warm-ups on startup.
    load_guard: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(
        ultra_fast_name: &str,
        fast_name: &str,
        quality_name: &str,
        ultra_quality_name: &str,
    ) -> Self {
        ModelRegistry {
            ultra_fast: Arc::new(ModelDescriptor::new(ultra_fast_name, QualityTier::UltraFast)),
            fast: Arc::new(ModelDescriptor::new(fast_name, QualityTier::Fast)),
            quality: Arc::new(ModelDescriptor::new(quality_name, QualityTier::Quality)),
            ultra_quality: Arc::new(ModelDescriptor::new(
                ultra_quality_name,
                QualityTier::UltraQuality,
            )),
            load_guard: Mutex::new(()),
        }
    }

    /// Pure lookup from a classifier bucket to the descriptor that should
    /// serve it: `simple -> ultra_fast`, `fast -> fast`, `balanced ->
    /// quality`, `complex -> ultra_quality`, anything else -> `fast`.
    pub fn select(&self, bucket: Bucket) -> Arc<ModelDescriptor> {
        match bucket {
            Bucket::Simple => self.ultra_fast.clone(),
            Bucket::Fast => self.fast.clone(),
            Bucket::Balanced => self.quality.clone(),
            Bucket::Complex => self.ultra_quality.clone(),
        }
    }

    pub fn descriptor_for_name(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        for d in [&self.ultra_fast, &self.fast, &self.quality, &self.ultra_quality] {
            if d.name == name {
                return Some(d.clone());
            }
        }
        None
    }

    pub fn all(&self) -> [Arc<ModelDescriptor>; 4] {
        [
            self.ultra_fast.clone(),
            self.fast.clone(),
            self.quality.clone(),
            self.ultra_quality.clone(),
        ]
    }

    /// Idempotently ensures `descriptor`'s model is warmed up in the LLM
    /// runtime. Best-effort: failure leaves `loaded=false` and only logs a
    /// warning, it never fails the caller's request. Goes through the
    /// shared `llm_pool` (same connection pool and concurrency permit
    /// every other LLM call acquires), rather than opening a connection
    /// of its own.
    pub async fn ensure_loaded(&self, descriptor: &Arc<ModelDescriptor>, llm_pool: &HttpPool, llm_base_url: &str) {
        let _guard = self.load_guard.lock().await;

        if descriptor.loaded() {
            return;
        }

        let _permit = llm_pool.acquire().await;
        match llm::warm_up(llm_pool.client(), llm_base_url, &descriptor.name).await {
            Ok(()) => {
                descriptor.loaded.store(true, Ordering::Release);
                info!("model '{}' warmed up successfully", descriptor.name);
            }
            Err(e) => {
                warn!("model '{}' warm-up failed: {}", descriptor.name, e);
            }
        }
    }

    pub fn mark_used(&self, descriptor: &Arc<ModelDescriptor>, now_unix_ms: i64) {
        descriptor.mark_used(now_unix_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Bucket;

    fn registry() -> ModelRegistry {
        ModelRegistry::new("uf-model", "fast-model", "quality-model", "uq-model")
    }

    #[test]
    fn select_maps_each_bucket_to_the_right_tier() {
        let reg = registry();
        assert_eq!(reg.select(Bucket::Simple).name, "uf-model");
        assert_eq!(reg.select(Bucket::Fast).name, "fast-model");
        assert_eq!(reg.select(Bucket::Balanced).name, "quality-model");
        assert_eq!(reg.select(Bucket::Complex).name, "uq-model");
    }

    #[test]
    fn descriptors_start_unloaded() {
        let reg = registry();
        for d in reg.all() {
            assert!(!d.loaded());
        }
    }

    #[test]
    fn descriptor_for_name_finds_match() {
        let reg = registry();
        let d = reg.descriptor_for_name("quality-model").unwrap();
        assert_eq!(d.quality_tier, QualityTier::Quality);
        assert!(reg.descriptor_for_name("nonexistent").is_none());
    }

    #[tokio::test]
    async fn ensure_loaded_is_best_effort_on_failure() {
        let reg = registry();
        let d = reg.select(Bucket::Simple);
        let pool = HttpPool::new(10, 10);
        // No LLM runtime listening here; warm-up must fail gracefully.
        reg.ensure_loaded(&d, &pool, "http://127.0.0.1:1").await;
        assert!(!d.loaded());
    }

    #[test]
    fn mark_used_updates_last_use() {
        let reg = registry();
        let d = reg.select(Bucket::Fast);
        assert_eq!(d.last_use_unix_ms(), 0);
        reg.mark_used(&d, 12345);
        assert_eq!(d.last_use_unix_ms(), 12345);
    }
}
