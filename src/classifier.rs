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

/// Complexity bucket a question is routed into by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Simple,
    Fast,
    Balanced,
    Complex,
}

const SIMPLE_INDICATORS: &[&str] = &["what is", "define", "explain briefly", "yes/no", "true/false"];
const COMPLEX_INDICATORS: &[&str] = &["analyze", "compare", "detailed", "comprehensive", "step by step"];

/// Pure heuristic mapping a question to a complexity bucket. Deterministic:
/// the same question always yields the same bucket.
pub fn classify(question: &str) -> Bucket {
    let lowered = question.to_lowercase();
    let token_count = question.split_whitespace().count();

    if SIMPLE_INDICATORS.iter().any(|i| lowered.contains(i)) && token_count < 10 {
        return Bucket::Simple;
    }

    if COMPLEX_INDICATORS.iter().any(|i| lowered.contains(i)) || token_count > 20 {
        return Bucket::Complex;
    }

    Bucket::Fast
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_what_is_question_is_simple() {
        assert_eq!(classify("What is Docker?"), Bucket::Simple);
    }

    #[test]
    fn simple_indicator_with_too_many_tokens_is_not_simple() {
        // 10 tokens with "what is" prefix routes to fast, not simple (< 10 required).
        let q = "what is the difference between these two things today now";
        assert_eq!(q.split_whitespace().count(), 10);
        assert_eq!(classify(q), Bucket::Fast);
    }

    #[test]
    fn complex_indicator_routes_to_complex() {
        assert_eq!(
            classify("Please analyze this dataset for anomalies"),
            Bucket::Complex
        );
    }

    #[test]
    fn long_question_without_indicators_is_complex() {
        let q = "word ".repeat(21);
        assert_eq!(classify(q.trim()), Bucket::Complex);
    }

    #[test]
    fn plain_question_is_fast() {
        assert_eq!(classify("How do I configure the cache eviction policy?"), Bucket::Fast);
    }

    #[test]
    fn boundary_ten_tokens_is_fast_not_simple() {
        // exactly 10 tokens disqualifies the "< 10" simple rule
        let q = "what is the size of this particular dataset exactly now";
        assert_eq!(q.split_whitespace().count(), 10);
        assert_eq!(classify(q), Bucket::Fast);
    }

    #[test]
    fn boundary_eleven_tokens_routes_to_fast() {
        let q = "what is the meaning behind this specific term used here today";
        assert_eq!(q.split_whitespace().count(), 11);
        assert_eq!(classify(q), Bucket::Fast);
    }

    #[test]
    fn classification_is_deterministic() {
        let q = "Compare these two approaches in detail";
        assert_eq!(classify(q), classify(q));
    }
}
