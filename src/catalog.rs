//! Local parts dataset used when the marketplace's policy agent blocks a
//! request: reduced-fidelity search and detail over a statically loaded
//! JSON file, immutable for the process lifetime.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

struct LocalPart {
    id: String,
    record: Value,
    /// Lowercased serialization of the whole record, matched by substring.
    haystack: String,
}

pub struct LocalCatalog {
    parts: Vec<LocalPart>,
}

impl LocalCatalog {
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    /// Load the dataset from a JSON file holding an array of part records.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read local parts dataset at {path}"))?;
        let records: Vec<Value> =
            serde_json::from_str(&raw).context("Local parts dataset is not a JSON array")?;

        let catalog = Self::from_records(records);
        info!("Loaded {} local part records from {path}", catalog.len());
        Ok(catalog)
    }

    pub fn from_records(records: Vec<Value>) -> Self {
        let parts = records
            .into_iter()
            .map(|record| {
                let id = match &record["id"] {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => String::new(),
                };
                let haystack = record.to_string().to_lowercase();
                LocalPart {
                    id,
                    record,
                    haystack,
                }
            })
            .collect();

        Self { parts }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Case-insensitive substring search over the serialized records,
    /// paginated by `limit`/`offset`. An empty query or no match yields an
    /// empty result set, never an error. Ordering follows the dataset, so
    /// the same query always returns the same slice.
    pub fn search(&self, query: &str, limit: usize, offset: usize) -> Value {
        let needle = query.trim().to_lowercase();

        let matches: Vec<&LocalPart> = if needle.is_empty() {
            Vec::new()
        } else {
            self.parts
                .iter()
                .filter(|part| part.haystack.contains(&needle))
                .collect()
        };

        let total = matches.len();
        let results: Vec<Value> = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|part| part.record.clone())
            .collect();

        json!({
            "results": results,
            "paging": { "total": total, "limit": limit, "offset": offset },
            "filters": [],
            "available_filters": [],
            "total": total,
        })
    }

    /// Exact or case-insensitive identifier match.
    pub fn product_detail(&self, id: &str) -> Option<Value> {
        self.parts
            .iter()
            .find(|part| part.id == id || part.id.eq_ignore_ascii_case(id))
            .map(|part| part.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LocalCatalog {
        LocalCatalog::from_records(vec![
            json!({"id": "GS-001", "title": "Pastilha de freio Gol 2015", "category": "freios"}),
            json!({"id": "GS-002", "title": "Amortecedor dianteiro Palio", "category": "suspensao"}),
            json!({"id": "GS-003", "title": "Pastilha de freio Uno", "category": "freios"}),
            json!({"id": "GS-004", "title": "Filtro de oleo Corsa", "category": "motor"}),
        ])
    }

    #[test]
    fn search_is_case_insensitive_and_matches_any_field() {
        let hits = catalog().search("FREIOS", 50, 0);
        assert_eq!(hits["total"], 2);
        assert_eq!(hits["results"][0]["id"], "GS-001");
        assert_eq!(hits["results"][1]["id"], "GS-003");
    }

    #[test]
    fn search_is_deterministic_across_calls() {
        let catalog = catalog();
        let first = catalog.search("pastilha", 1, 1);
        let second = catalog.search("pastilha", 1, 1);
        assert_eq!(first, second);
        assert_eq!(first["results"][0]["id"], "GS-003");
        // Paging reflects the full match count, not the slice.
        assert_eq!(first["total"], 2);
        assert_eq!(first["paging"]["offset"], 1);
    }

    #[test]
    fn empty_query_returns_empty_result_set() {
        let hits = catalog().search("   ", 50, 0);
        assert_eq!(hits["total"], 0);
        assert_eq!(hits["results"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let hits = catalog().search("cambio automatico", 50, 0);
        assert_eq!(hits["total"], 0);
    }

    #[test]
    fn detail_matches_id_case_insensitively() {
        let catalog = catalog();
        assert_eq!(catalog.product_detail("gs-002").unwrap()["id"], "GS-002");
        assert!(catalog.product_detail("GS-999").is_none());
    }

    #[test]
    fn offset_past_the_end_yields_empty_slice() {
        let hits = catalog().search("pastilha", 10, 5);
        assert_eq!(hits["results"].as_array().unwrap().len(), 0);
        assert_eq!(hits["total"], 2);
    }
}
