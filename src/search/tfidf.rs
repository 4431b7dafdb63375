//! TF-IDF cosine ranking over tokenized names and known column names.

use std::collections::HashMap;

use super::{tokenize, SearchHit};
use crate::datasource::TableRef;

/// Per-source TF-IDF vectors, rebuilt whenever the documents change.
#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    idf: HashMap<String, f64>,
    vectors: Vec<(TableRef, HashMap<String, f64>, f64)>,
}

impl TfIdfIndex {
    /// Build from `(table, tokens)` documents.
    pub fn build(documents: &[(TableRef, Vec<String>)]) -> Self {
        let n = documents.len() as f64;
        let mut df: HashMap<&str, usize> = HashMap::new();
        for (_, tokens) in documents {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for token in seen {
                *df.entry(token).or_default() += 1;
            }
        }
        // smoothed: ln((1 + n) / (1 + df)) + 1
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(token, count)| {
                (
                    token.to_string(),
                    ((1.0 + n) / (1.0 + count as f64)).ln() + 1.0,
                )
            })
            .collect();

        let vectors = documents
            .iter()
            .map(|(table, tokens)| {
                let vector = weigh(tokens, &idf);
                let norm = norm(&vector);
                (table.clone(), vector, norm)
            })
            .collect();

        Self { idf, vectors }
    }

    /// Tables with a non-zero cosine score, best first, ties by qualified name.
    pub fn rank(&self, query: &str) -> Vec<SearchHit> {
        let query_vector = weigh(&tokenize(query), &self.idf);
        let query_norm = norm(&query_vector);
        if query_norm == 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .filter(|(_, _, doc_norm)| *doc_norm > 0.0)
            .filter_map(|(table, vector, doc_norm)| {
                let dot: f64 = query_vector
                    .iter()
                    .filter_map(|(token, weight)| vector.get(token).map(|w| w * weight))
                    .sum();
                let score = dot / (query_norm * doc_norm);
                (score > 0.0).then(|| SearchHit {
                    table: table.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.table.qualified_name.cmp(&b.table.qualified_name))
        });
        hits
    }
}

/// Term frequency times idf; tokens outside the vocabulary are dropped.
fn weigh(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut counts: HashMap<&str, f64> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1.0;
    }
    let total = tokens.len().max(1) as f64;
    counts
        .into_iter()
        .filter_map(|(token, count)| {
            idf.get(token)
                .map(|weight| (token.to_string(), count / total * weight))
        })
        .collect()
}

fn norm(vector: &HashMap<String, f64>) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}
