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

use lru::LruCache;
use md5::{Digest, Md5};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Value stored per cache key: the generated answer plus the last-access
/// timestamp used to drive LRU eviction.
#[derive(Clone)]
pub struct CacheEntry {
    pub answer: String,
    pub last_access: Instant,
}

/// Fixed-capacity associative cache mapping a fingerprint to a generated
/// answer. Reads and writes serialize on a single mutex: cache work is
/// pure memory, so lock contention is an acceptable tradeoff for the
/// simplicity of never holding a lock across a suspension point.
pub struct ResponseCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    capacity: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        ResponseCache {
            inner: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Looks up `key`, touching its last-access time on a hit.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut cache = self.inner.lock().await;
        match cache.get_mut(key) {
            Some(entry) => {
                entry.last_access = Instant::now();
                let answer = entry.answer.clone();
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Some(answer)
            }
            None => {
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces the entry for `key`. When the cache is full,
    /// `lru::LruCache` evicts the entry with the smallest `last_access`
    /// (the one that hasn't been touched by `get` the longest) atomically
    /// with the insert, since both happen under the same mutex guard.
    pub async fn put(&self, key: String, answer: String) {
        let mut cache = self.inner.lock().await;
        cache.put(
            key,
            CacheEntry {
                answer,
                last_access: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Drops every cached answer. Used by the admin cache-invalidation
    /// endpoint; does not reset hit/miss counters.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn hit_count(&self) -> u64 {
        self.hits.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn miss_count(&self) -> u64 {
        self.misses.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Derives the stable cache key for `(normalized_question, passages)`:
/// `md5(normalized_question + "\0" + join(passages, "\0"))`.
pub fn fingerprint(normalized_question: &str, passages: &[String]) -> String {
    let joined = passages.join("\0");
    let mut hasher = Md5::new();
    hasher.update(normalized_question.as_bytes());
    hasher.update(b"\0");
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trims surrounding whitespace and lower-cases a question for cache-key
/// purposes only; the original string is what gets sent to the LLM.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let passages = vec!["a".to_string(), "b".to_string()];
        let k1 = fingerprint("what is docker", &passages);
        let k2 = fingerprint("what is docker", &passages);
        assert_eq!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_for_different_passages() {
        let k1 = fingerprint("q", &["a".to_string()]);
        let k2 = fingerprint("q", &["b".to_string()]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_handles_empty_passages() {
        let k1 = fingerprint("q", &[]);
        let k2 = fingerprint("q", &[]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_question("  What IS Docker?  "), "what is docker?");
    }

    #[tokio::test]
    async fn miss_then_hit_roundtrip() {
        let cache = ResponseCache::new(10);
        let key = fingerprint("q", &[]);
        assert!(cache.get(&key).await.is_none());

        cache.put(key.clone(), "answer".to_string()).await;
        let got = cache.get(&key).await;
        assert_eq!(got, Some("answer".to_string()));
    }

    #[tokio::test]
    async fn size_never_exceeds_capacity() {
        let cache = ResponseCache::new(2);
        cache.put("a".into(), "1".into()).await;
        cache.put("b".into(), "2".into()).await;
        cache.put("c".into(), "3".into()).await;

        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_used_entry() {
        let cache = ResponseCache::new(2);
        cache.put("a".into(), "1".into()).await;
        cache.put("b".into(), "2".into()).await;

        // touch "a" so it's more recently used than "b"
        let _ = cache.get("a").await;

        cache.put("c".into(), "3".into()).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn insert_replaces_existing_entry() {
        let cache = ResponseCache::new(10);
        cache.put("a".into(), "1".into()).await;
        cache.put("a".into(), "2".into()).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("a").await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn clear_removes_all_entries_without_resetting_counters() {
        let cache = ResponseCache::new(10);
        cache.put("a".into(), "1".into()).await;
        cache.put("b".into(), "2".into()).await;
        let _ = cache.get("a").await;

        cache.clear().await;

        assert_eq!(cache.len().await, 0);
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.hit_count().await, 1);
    }

    #[tokio::test]
    async fn hit_and_miss_counters_track_lookups() {
        let cache = ResponseCache::new(10);
        cache.put("a".into(), "1".into()).await;

        let _ = cache.get("a").await;
        let _ = cache.get("missing").await;

        assert_eq!(cache.hit_count().await, 1);
        assert_eq!(cache.miss_count().await, 1);
    }
}
