//! Regular-expression ranking over qualified names.

use regex::Regex;

use super::SearchHit;
use crate::datasource::TableRef;
use crate::error::{QuarryError, Result};

const FULL_MATCH: f64 = 1.0;
const PARTIAL_MATCH: f64 = 0.5;

/// A compiled pattern plus its anchored form.
#[derive(Debug, Clone)]
pub struct RegexQuery {
    any: Regex,
    full: Regex,
}

impl RegexQuery {
    /// Compile `pattern`. A malformed pattern is an [`QuarryError::InvalidQuery`].
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |e: regex::Error| QuarryError::InvalidQuery(format!("invalid regex '{pattern}': {e}"));
        let any = Regex::new(pattern).map_err(invalid)?;
        let full = Regex::new(&format!("^(?:{pattern})$")).map_err(invalid)?;
        Ok(Self { any, full })
    }

    fn score(&self, name: &str) -> Option<f64> {
        if self.full.is_match(name) {
            Some(FULL_MATCH)
        } else if self.any.is_match(name) {
            Some(PARTIAL_MATCH)
        } else {
            None
        }
    }

    /// Full matches first, then partial matches, each in discovery order.
    pub fn rank(&self, tables: &[TableRef]) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = tables
            .iter()
            .filter_map(|t| {
                self.score(&t.qualified_name).map(|score| SearchHit {
                    table: t.clone(),
                    score,
                })
            })
            .collect();
        // stable: keeps discovery order within a score
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> Vec<TableRef> {
        ["public.order_items", "public.orders", "public.customers"]
            .into_iter()
            .map(|n| TableRef::new("A", n))
            .collect()
    }

    #[test]
    fn full_matches_rank_first() {
        let query = RegexQuery::compile(r"public\.orders").unwrap();
        let hits = query.rank(&tables());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);

        let query = RegexQuery::compile("order").unwrap();
        let hits = query.rank(&tables());
        let names: Vec<_> = hits.iter().map(|h| h.table.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["public.order_items", "public.orders"]);

        let query = RegexQuery::compile(r"public\.orders|order").unwrap();
        let hits = query.rank(&tables());
        assert_eq!(hits[0].table.qualified_name, "public.orders");
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn malformed_pattern_is_invalid_query() {
        assert!(matches!(
            RegexQuery::compile("orders("),
            Err(QuarryError::InvalidQuery(_))
        ));
    }
}
