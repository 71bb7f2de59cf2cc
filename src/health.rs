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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::client::HttpConnector;
use hyper::Client;
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::adapters::vector_store::probe_health;
use crate::metrics::Metrics;

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Health state of a single downstream collaborator, updated exclusively
/// by the health monitor; every other component only reads it.
#[derive(Debug, Clone, Copy)]
pub struct ServiceStatus {
    pub healthy: bool,
    pub last_probe: Instant,
    pub consecutive_failures: u32,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        ServiceStatus {
            healthy: false,
            last_probe: Instant::now(),
            consecutive_failures: 0,
        }
    }
}

/// A named downstream service to probe on each health-check tick.
#[derive(Clone)]
pub struct ProbeTarget {
    pub name: String,
    pub base_url: String,
    pub health_path: String,
}

/// Struct-behind-a-mutex statuses for every configured downstream, in
/// place of a raw global dict of booleans.
pub struct HealthMonitor {
    statuses: Arc<RwLock<HashMap<String, ServiceStatus>>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        HealthMonitor {
            statuses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn status_of(&self, name: &str) -> Option<ServiceStatus> {
        self.statuses.read().await.get(name).copied()
    }

    pub async fn all_statuses(&self) -> HashMap<String, ServiceStatus> {
        self.statuses.read().await.clone()
    }

    /// Probes every target in parallel with a 2s timeout each, then
    /// updates the shared status map. Does not gate the request path —
    /// adapters make their own success/failure decisions independently.
    pub async fn run_once(&self, client: &Client<HttpConnector>, targets: &[ProbeTarget]) {
        let probes = targets.iter().map(|target| {
            let client = client.clone();
            let target = target.clone();
            async move {
                let healthy = tokio::time::timeout(
                    Duration::from_secs(2),
                    probe_health(&client, &target.base_url, &target.health_path, 2),
                )
                .await
                .unwrap_or(false);
                (target.name, healthy)
            }
        });

        let results = futures::future::join_all(probes).await;

        let mut statuses = self.statuses.write().await;
        for (name, healthy) in results {
            let entry = statuses.entry(name.clone()).or_default();
            entry.last_probe = Instant::now();
            if healthy {
                entry.healthy = true;
                entry.consecutive_failures = 0;
            } else {
                entry.healthy = false;
                entry.consecutive_failures += 1;
            }
            info!(
                "health probe '{}': {}",
                name,
                if healthy { "healthy" } else { "unhealthy" }
            );
        }
    }

    /// Launches the periodic probing loop, exiting promptly when
    /// `shutdown` fires. Stamps `metrics.last_health_check` after every
    /// probe round so the admin status surface reflects how fresh the
    /// health view is.
    pub fn spawn(
        self: Arc<Self>,
        client: Client<HttpConnector>,
        targets: Vec<ProbeTarget>,
        interval_secs: u64,
        metrics: Arc<Metrics>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once(&client, &targets).await;
                        metrics.record_health_check(now_unix_ms());
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("health monitor shutting down");
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_once_marks_unreachable_service_unhealthy() {
        let monitor = HealthMonitor::new();
        let client = Client::new();
        let targets = vec![ProbeTarget {
            name: "vector_store".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            health_path: "/heartbeat".to_string(),
        }];

        monitor.run_once(&client, &targets).await;

        let status = monitor.status_of("vector_store").await.unwrap();
        assert!(!status.healthy);
        assert_eq!(status.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn consecutive_failures_accumulate_across_probes() {
        let monitor = HealthMonitor::new();
        let client = Client::new();
        let targets = vec![ProbeTarget {
            name: "llm".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            health_path: "/api/tags".to_string(),
        }];

        monitor.run_once(&client, &targets).await;
        monitor.run_once(&client, &targets).await;

        let status = monitor.status_of("llm").await.unwrap();
        assert_eq!(status.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn unknown_service_has_no_status_until_probed() {
        let monitor = HealthMonitor::new();
        assert!(monitor.status_of("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn spawned_loop_stamps_last_health_check_then_exits_on_shutdown() {
        let monitor = Arc::new(HealthMonitor::new());
        let client = Client::new();
        let metrics = Arc::new(Metrics::new(0));
        let targets = vec![ProbeTarget {
            name: "vector_store".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            health_path: "/heartbeat".to_string(),
        }];
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        assert_eq!(metrics.snapshot().last_health_check_unix_ms, 0);

        monitor.spawn(client, targets, 1, metrics.clone(), shutdown_rx);

        // First tick fires immediately; give the spawned task a moment to run.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(metrics.snapshot().last_health_check_unix_ms > 0);

        let _ = shutdown_tx.send(true);
    }
}
