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

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::ingress::AppState;

#[derive(Serialize)]
struct InvalidateResponse {
    message: String,
    entries_cleared: usize,
}

/// `DELETE /admin/api/cache`: drops every cached answer. Hit/miss counters
/// are left alone since they describe lifetime behavior, not current
/// occupancy.
pub async fn invalidate_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cleared = state.orchestrator.cache.len().await;
    state.orchestrator.cache.clear().await;

    tracing::info!("cleared {cleared} entries from the response cache");

    (
        StatusCode::OK,
        Json(InvalidateResponse {
            message: "response cache cleared".to_string(),
            entries_cleared: cleared,
        }),
    )
}
