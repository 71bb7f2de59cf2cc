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
use hyper::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Shared connection pool for all outbound requests to one downstream
/// service. Wraps a single `hyper::Client` (keep-alive, per-host idle cap
/// via `pool_max_idle_per_host`) plus a semaphore enforcing a total
/// concurrent-request cap across every task that uses it. Owns its
/// connections exclusively; adapters borrow it, never clone its internals.
pub struct HttpPool {
    client: Client<HttpConnector>,
    semaphore: Arc<Semaphore>,
}

impl HttpPool {
    pub fn new(max_concurrent_requests: usize, pool_max_idle_per_host: usize) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(300))
            .build_http();

        HttpPool {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
        }
    }

    pub fn client(&self) -> &Client<HttpConnector> {
        &self.client
    }

    /// Acquires a concurrency slot, blocking the caller until one frees up.
    /// This pool queues callers past the cap instead of rejecting them
    /// outright, since the downstream timeout already bounds how long a
    /// slot can be held.
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore should never be closed")
    }
}
