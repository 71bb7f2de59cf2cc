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

use axum::{extract::State, response::IntoResponse, Json};

use crate::health::HealthMonitor;
use crate::pipeline::{Orchestrator, QueryRequest};

/// Everything a handler needs to serve a request: the orchestrator (owns
/// the cache, models, metrics, and downstream pools) plus the health
/// monitor the admin status endpoint reports from.
pub struct AppState {
    pub app_id: String,
    pub orchestrator: Arc<Orchestrator>,
    pub health: Arc<HealthMonitor>,
}

/// `POST /query`: the orchestrator's only ingress surface. Always answers
/// with a single JSON `QueryResult` — the `streaming` field on the request
/// only controls whether the LLM call underneath uses the runtime's
/// streaming API, not whether this HTTP response itself is chunked.
/// The HTTP status is always 200 for a well-formed request; clients are
/// expected to inspect `success`/`error_kind` on the body rather than the
/// status code, even for an empty `question`.
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let result = state.orchestrator.process_query(request).await;
    Json(result)
}
