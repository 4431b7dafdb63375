//! Edit-distance ranking for misspelled table names.

use super::{tokenize, SearchHit};
use crate::datasource::TableRef;

/// Best normalized Levenshtein similarity of `query` against the whole name
/// and against each of its segments.
pub fn similarity(query: &str, name: &str) -> f64 {
    let query = normalize(query);
    let lowered = name.to_lowercase();
    let segments = tokenize(name);
    let joined = segments.join(" ");
    let whole = strsim::normalized_levenshtein(&query, &lowered)
        .max(strsim::normalized_levenshtein(&query, &joined));
    segments
        .iter()
        .map(|segment| strsim::normalized_levenshtein(&query, segment))
        .fold(whole, f64::max)
}

fn normalize(query: &str) -> String {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        query.trim().to_lowercase()
    } else {
        tokens.join(" ")
    }
}

/// Every table scored, best first, ties by qualified name.
pub fn rank(query: &str, tables: &[TableRef]) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = tables
        .iter()
        .map(|t| SearchHit {
            table: t.clone(),
            score: similarity(query, &t.qualified_name),
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.table.qualified_name.cmp(&b.table.qualified_name))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misspelling_finds_the_intended_table() {
        let tables = vec![
            TableRef::new("A", "public.orders"),
            TableRef::new("A", "public.customers"),
        ];
        let hits = rank("custmer", &tables);
        assert_eq!(hits[0].table.qualified_name, "public.customers");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(similarity("ORDERS", "public.orders"), 1.0);
    }

    #[test]
    fn ranking_is_deterministic() {
        let tables = vec![TableRef::new("A", "b.x"), TableRef::new("A", "a.x")];
        let first = rank("x", &tables);
        let second = rank("x", &tables);
        assert_eq!(first, second);
        assert_eq!(first[0].table.qualified_name, "a.x");
    }
}
