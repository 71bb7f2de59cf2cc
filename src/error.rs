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

use serde::Serialize;

/// Closed taxonomy of request-level failures. Every path through the
/// orchestration pipeline ends in a well-formed `QueryResult` or an
/// explicit cancellation; no exception-like condition escapes a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or malformed question. Never retried internally.
    InvalidInput,
    /// Vector store unreachable or returned non-200. Recovered locally by
    /// falling back to the keyword table; not surfaced to the caller as a
    /// failed `QueryResult` on its own.
    RetrievalUnavailable,
    /// LLM call failed or returned an error-prefixed string.
    GenerationError,
    /// Caller went away or shutdown signal received.
    Cancelled,
    /// Unexpected condition (parse failure, arithmetic). Logged and
    /// surfaced to the caller as `generation_error`.
    Internal,
}
