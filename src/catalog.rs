//! Static document catalog: year → quarter → document identifiers.
//!
//! Loaded once at startup from a JSON file and never mutated. The catalog
//! drives the selection widgets and validates incoming selections.
//!
//! ```json
//! { "2023": { "Q1": ["AAPL", "MSFT"], "Q2": ["AAPL"] } }
//! ```
//!
//! Years, quarters, and documents all iterate in the order they appear in
//! the file, so the first entry of each level is the default selection.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::path::Path;

use crate::error::ChatError;
use crate::models::SelectionMetadata;

/// Quarter → document identifiers, in file order.
pub type Quarters = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Year → quarters, in file order.
    years: IndexMap<String, Quarters>,
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    Catalog::from_json(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
}

impl Catalog {
    pub fn from_json(content: &str) -> Result<Self> {
        let years: IndexMap<String, Quarters> = serde_json::from_str(content)?;
        Ok(Self { years })
    }

    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.years.keys().map(String::as_str)
    }

    pub fn quarters(&self, year: &str) -> Option<impl Iterator<Item = &str>> {
        self.years
            .get(year)
            .map(|quarters| quarters.keys().map(String::as_str))
    }

    pub fn documents(&self, year: &str, quarter: &str) -> Option<&[String]> {
        self.years
            .get(year)
            .and_then(|quarters| quarters.get(quarter))
            .map(Vec::as_slice)
    }

    /// Every year with its quarters, in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Quarters)> {
        self.years.iter().map(|(year, quarters)| (year.as_str(), quarters))
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Total number of documents across all years and quarters.
    pub fn document_count(&self) -> usize {
        self.years
            .values()
            .flat_map(|q| q.values())
            .map(Vec::len)
            .sum()
    }

    /// Validate a (year, quarter, document) triple against the catalog and
    /// build its selection metadata.
    pub fn resolve(
        &self,
        year: &str,
        quarter: &str,
        document: &str,
    ) -> Result<SelectionMetadata, ChatError> {
        let quarters = self
            .years
            .get(year)
            .ok_or_else(|| ChatError::UnknownSelection(format!("year '{}'", year)))?;
        let docs = quarters.get(quarter).ok_or_else(|| {
            ChatError::UnknownSelection(format!("quarter '{}' in {}", quarter, year))
        })?;
        if !docs.iter().any(|d| d == document) {
            return Err(ChatError::UnknownSelection(format!(
                "document '{}' in {} {}",
                document, year, quarter
            )));
        }
        Ok(SelectionMetadata::from_selection(year, quarter, document))
    }

    /// The selection each widget shows before the user touches it: first
    /// year, its first quarter, that quarter's first document.
    pub fn default_selection(&self) -> Option<SelectionMetadata> {
        let (year, quarters) = self.years.iter().next()?;
        let (quarter, docs) = quarters.iter().next()?;
        let document = docs.first()?;
        Some(SelectionMetadata::from_selection(year, quarter, document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> Catalog {
        Catalog::from_json(
            r#"{
                "2024": { "Q1": ["NVDA"] },
                "2023": { "Q2": ["AAPL"], "Q1": ["MSFT", "AAPL"] }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_single_entry_catalog() {
        let catalog = Catalog::from_json(r#"{"2023": {"Q1": ["doc1"]}}"#).unwrap();
        let meta = catalog.resolve("2023", "Q1", "doc1").unwrap();
        assert_eq!(meta.filename, "doc1.pdf");
        assert_eq!(meta.year, "2023");
        assert_eq!(meta.quarter, "Q1");
    }

    #[test]
    fn test_years_and_quarters_keep_file_order() {
        let catalog = sample();
        assert_eq!(catalog.years().collect::<Vec<_>>(), vec!["2024", "2023"]);
        assert_eq!(
            catalog.quarters("2023").unwrap().collect::<Vec<_>>(),
            vec!["Q2", "Q1"]
        );
        assert!(catalog.quarters("1999").is_none());
    }

    #[test]
    fn test_documents_keep_file_order() {
        let catalog = sample();
        assert_eq!(
            catalog.documents("2023", "Q1").unwrap(),
            &["MSFT".to_string(), "AAPL".to_string()]
        );
        assert_eq!(catalog.document_count(), 4);
    }

    #[test]
    fn test_default_selection() {
        let meta = sample().default_selection().unwrap();
        assert_eq!(meta, SelectionMetadata::from_selection("2024", "Q1", "NVDA"));
        assert!(Catalog::default().default_selection().is_none());
    }

    #[test]
    fn test_default_selection_follows_file_not_sort_order() {
        let catalog =
            Catalog::from_json(r#"{"2024": {"Q4": ["NVDA"]}, "2023": {"Q1": ["AAPL"]}}"#)
                .unwrap();
        assert_eq!(
            catalog.default_selection().unwrap(),
            SelectionMetadata::from_selection("2024", "Q4", "NVDA")
        );
        let years: Vec<_> = catalog.entries().map(|(year, _)| year).collect();
        assert_eq!(years, vec!["2024", "2023"]);
    }

    #[test]
    fn test_resolve_rejects_unknown_entries() {
        let catalog = sample();
        assert!(matches!(
            catalog.resolve("2022", "Q1", "MSFT"),
            Err(ChatError::UnknownSelection(_))
        ));
        assert!(matches!(
            catalog.resolve("2024", "Q3", "NVDA"),
            Err(ChatError::UnknownSelection(_))
        ));
        assert!(matches!(
            catalog.resolve("2024", "Q1", "MSFT"),
            Err(ChatError::UnknownSelection(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mappings.json");
        fs::write(&path, r#"{"2023": {"Q4": ["GOOG"]}}"#).unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.document_count(), 1);
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mappings.json");
        fs::write(&path, r#"{"2023": ["GOOG"]}"#).unwrap();
        let err = load_catalog(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse catalog"));
    }
}
