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

use once_cell::sync::Lazy;

/// Compile-time keyword -> grounding-snippet table used when the vector
/// store is unreachable. First keyword found as a substring of the
/// lowercased question wins; order matters for overlapping keywords.
pub static FALLBACK_TABLE: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        (
            "machine learning",
            &["ML enables computers to learn from data without explicit programming."],
        ),
        (
            "docker",
            &["Docker containers package applications with dependencies for consistent deployment."],
        ),
        (
            "python",
            &["Python is a high-level programming language known for simplicity and readability."],
        ),
        (
            "vector database",
            &["Vector databases store high-dimensional vectors for similarity search."],
        ),
        ("rag", &["RAG combines retrieval and generation for accurate AI responses."]),
    ]
});

/// Generic snippet returned when no keyword in `FALLBACK_TABLE` matches.
const GENERIC_FALLBACK: &str = "General knowledge context for query processing.";

/// Looks up grounding passages for `question` in the fallback table.
/// Pure and side-effect free: same input always yields the same output.
pub fn lookup(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();

    for (keyword, snippets) in FALLBACK_TABLE.iter() {
        if lowered.contains(keyword) {
            return snippets.iter().map(|s| s.to_string()).collect();
        }
    }

    vec![GENERIC_FALLBACK.to_string()]
}
