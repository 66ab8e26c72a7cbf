//! Deduplication and token-budget trimming of search results.

use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::retrieval::SearchResult;

/// Estimated token cost of a piece of text.
pub fn estimate_tokens(text: &str, tokens_per_char: f64) -> usize {
    (text.chars().count() as f64 * tokens_per_char).ceil() as usize
}

/// Merge results from several queries into one ranked, budgeted list.
///
/// 1. Deduplicate on `(source_table, source_id)`, keeping the higher
///    combined score.
/// 2. Sort by combined score, descending.
/// 3. Keep results in order while the running token estimate stays within
///    budget. The first result is always kept, even when it alone is over.
pub fn dedupe_and_trim(results: Vec<SearchResult>, config: &RetrievalConfig) -> Vec<SearchResult> {
    let mut best: HashMap<(String, String), SearchResult> = HashMap::new();
    // First-seen order breaks score ties deterministically.
    let mut first_seen: Vec<(String, String)> = Vec::new();

    for result in results {
        let key = (result.source_table.clone(), result.source_id.clone());
        let replace = match best.get(&key) {
            Some(existing) => result.combined_score > existing.combined_score,
            None => {
                first_seen.push(key.clone());
                true
            }
        };
        if replace {
            best.insert(key, result);
        }
    }

    let mut deduped: Vec<SearchResult> = first_seen
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect();
    deduped.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used_tokens = 0usize;
    let mut kept = Vec::new();
    for result in deduped {
        let cost = estimate_tokens(&result.chunk_content, config.tokens_per_char);
        if !kept.is_empty() && used_tokens + cost > config.token_budget {
            break;
        }
        used_tokens += cost;
        kept.push(result);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::testing::result;

    fn config(token_budget: usize) -> RetrievalConfig {
        RetrievalConfig {
            token_budget,
            ..RetrievalConfig::default()
        }
    }

    #[test]
    fn test_estimate_tokens_counts_chars() {
        assert_eq!(estimate_tokens("abcd", 0.25), 1);
        assert_eq!(estimate_tokens("abcde", 0.25), 2);
        // Four CJK characters are twelve bytes but still four chars.
        assert_eq!(estimate_tokens("竜の巣穴", 0.25), 1);
    }

    #[test]
    fn test_dedupe_keeps_highest_score() {
        let results = vec![
            result("entities", "1", "low", 0.2),
            result("sessions", "9", "other", 0.5),
            result("entities", "1", "high", 0.9),
        ];

        let kept = dedupe_and_trim(results, &config(4000));

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].chunk_content, "high");
        assert_eq!(kept[1].source_id, "9");
    }

    #[test]
    fn test_sorted_descending_and_unique() {
        let results = vec![
            result("a", "1", "x", 0.1),
            result("a", "2", "x", 0.7),
            result("b", "1", "x", 0.4),
            result("a", "2", "x", 0.3),
        ];

        let kept = dedupe_and_trim(results, &config(4000));

        let scores: Vec<f64> = kept.iter().map(|r| r.combined_score).collect();
        assert_eq!(scores, vec![0.7, 0.4, 0.1]);
        let keys: std::collections::HashSet<_> = kept.iter().map(|r| r.source_key()).collect();
        assert_eq!(keys.len(), kept.len());
    }

    #[test]
    fn test_trim_to_budget() {
        // 40 chars at 0.25 = 10 tokens each.
        let chunk = "x".repeat(40);
        let results = vec![
            result("a", "1", &chunk, 0.9),
            result("a", "2", &chunk, 0.8),
            result("a", "3", &chunk, 0.7),
        ];

        let kept = dedupe_and_trim(results, &config(25));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_always_keeps_first_result() {
        let huge = "y".repeat(100_000);
        let results = vec![result("a", "1", &huge, 0.9), result("a", "2", "tiny", 0.1)];

        let kept = dedupe_and_trim(results, &config(10));

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source_id, "1");
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe_and_trim(Vec::new(), &config(10)).is_empty());
    }
}
