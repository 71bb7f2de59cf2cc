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

use axum::{response::IntoResponse, Json};
use serde::Serialize;

use crate::ingress::AppState;
use crate::metrics;

#[derive(Serialize)]
struct CacheStatus {
    entries: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
}

#[derive(Serialize)]
struct ServiceHealthView {
    healthy: bool,
    consecutive_failures: u32,
    last_probe_seconds_ago: f64,
}

#[derive(Serialize)]
struct Targets {
    avg_latency_seconds: f64,
    max_latency_seconds: f64,
    success_rate_percent: f64,
    cache_hit_rate_percent: f64,
}

#[derive(Serialize)]
struct StatusResponse {
    app_id: String,
    metrics: metrics::MetricsSnapshot,
    cache: CacheStatus,
    models: Vec<ModelView>,
    health: HashMap<String, ServiceHealthView>,
    targets: Targets,
}

#[derive(Serialize)]
struct ModelView {
    name: String,
    quality_tier: &'static str,
    loaded: bool,
    last_use_unix_ms: i64,
}

/// `GET /admin/api/status`: a point-in-time snapshot of everything an
/// operator would want to eyeball — query counters, cache occupancy,
/// model warm state, and downstream health — in one call.
pub async fn get_status(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.orchestrator.metrics.snapshot();
    let cache = &state.orchestrator.cache;

    let cache_status = CacheStatus {
        entries: cache.len().await,
        capacity: cache.capacity(),
        hits: cache.hit_count().await,
        misses: cache.miss_count().await,
    };

    let models = state
        .orchestrator
        .models
        .all()
        .into_iter()
        .map(|d| ModelView {
            name: d.name.clone(),
            quality_tier: match d.quality_tier {
                crate::models::QualityTier::UltraFast => "ultra_fast",
                crate::models::QualityTier::Fast => "fast",
                crate::models::QualityTier::Quality => "quality",
                crate::models::QualityTier::UltraQuality => "ultra_quality",
            },
            loaded: d.loaded(),
            last_use_unix_ms: d.last_use_unix_ms(),
        })
        .collect();

    let health = state
        .health
        .all_statuses()
        .await
        .into_iter()
        .map(|(name, status)| {
            (
                name,
                ServiceHealthView {
                    healthy: status.healthy,
                    consecutive_failures: status.consecutive_failures,
                    last_probe_seconds_ago: status.last_probe.elapsed().as_secs_f64(),
                },
            )
        })
        .collect();

    let (avg_target, max_target, success_target, cache_target) = metrics::targets();

    Json(StatusResponse {
        app_id: state.app_id.clone(),
        metrics: snapshot,
        cache: cache_status,
        models,
        health,
        targets: Targets {
            avg_latency_seconds: avg_target,
            max_latency_seconds: max_target,
            success_rate_percent: success_target,
            cache_hit_rate_percent: cache_target,
        },
    })
}
