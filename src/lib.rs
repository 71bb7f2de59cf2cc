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

// ----------------------
//  Module declarations
// ----------------------
// Internal modules for request classification, model routing, the bounded
// response cache, downstream HTTP adapters, health monitoring, and the
// orchestration pipeline that ties them together.
pub mod adapters;
pub mod admin;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fallback;
pub mod health;
pub mod http_pool;
pub mod ingress;
pub mod metrics;
pub mod models;
pub mod pipeline;
