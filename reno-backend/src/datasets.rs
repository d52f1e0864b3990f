//! Read-only reference datasets backing the renovation tools.
//!
//! All three collections are loaded once at process start and never mutated
//! afterwards, so they are shared across sessions behind a plain `Arc` with
//! no locking. A missing or corrupt file degrades that dataset to empty;
//! the corresponding tools then return empty results instead of crashing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<String>,
}

impl PriceRange {
    pub fn for_level(&self, level: &str) -> Option<&str> {
        match level {
            "budget" => self.budget.as_deref(),
            "medium" => self.medium.as_deref(),
            "high" => self.high.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub description: String,
    pub price_range: PriceRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_impact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialCategory {
    pub category: String,
    pub items: Vec<Material>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
    pub website: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub location: String,
    pub specializations: Vec<String>,
    pub price_range: String,
    pub years_in_business: u32,
    pub certifications: Vec<String>,
    pub contact_info: ContactInfo,
    pub rating: f64,
    pub review_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeCategory {
    pub name: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct MaterialsFile {
    materials: Vec<MaterialCategory>,
}

#[derive(Debug, Deserialize)]
struct CompaniesFile {
    companies: Vec<Company>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    categories: Vec<KnowledgeCategory>,
}

#[derive(Debug, Default)]
pub struct ReferenceData {
    pub materials: Vec<MaterialCategory>,
    pub companies: Vec<Company>,
    pub knowledge: Vec<KnowledgeCategory>,
}

fn load_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!(
                "Reference dataset {} unavailable ({}), degrading to empty",
                path.display(),
                e
            );
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!(
                "Reference dataset {} is corrupt ({}), degrading to empty",
                path.display(),
                e
            );
            None
        }
    }
}

impl ReferenceData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load all three datasets from `dir`. Never fails: each dataset that
    /// cannot be read or parsed is replaced by an empty collection.
    pub fn load(dir: &Path) -> Self {
        let materials = load_file::<MaterialsFile>(&dir.join("materials.json"))
            .map(|f| f.materials)
            .unwrap_or_default();
        let companies = load_file::<CompaniesFile>(&dir.join("companies.json"))
            .map(|f| f.companies)
            .unwrap_or_default();
        let knowledge = load_file::<KnowledgeFile>(&dir.join("knowledge_base.json"))
            .map(|f| f.categories)
            .unwrap_or_default();

        log::info!(
            "Loaded reference data: {} material categories, {} companies, {} knowledge categories",
            materials.len(),
            companies.len(),
            knowledge.len()
        );

        ReferenceData {
            materials,
            companies,
            knowledge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn shipped_datasets_parse() {
        let data = ReferenceData::load(Path::new("data"));
        assert!(!data.materials.is_empty());
        assert!(!data.companies.is_empty());
        assert!(!data.knowledge.is_empty());
        // Scenario data: the company directory covers 北京
        assert!(data.companies.iter().any(|c| c.location.contains("北京")));
    }

    #[test]
    fn missing_directory_degrades_to_empty() {
        let data = ReferenceData::load(Path::new("/nonexistent/reno-data"));
        assert!(data.materials.is_empty());
        assert!(data.companies.is_empty());
        assert!(data.knowledge.is_empty());
    }

    #[test]
    fn corrupt_file_degrades_that_dataset_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = std::fs::File::create(dir.path().join("companies.json")).unwrap();
        bad.write_all(b"{ not json").unwrap();
        std::fs::write(
            dir.path().join("materials.json"),
            r#"{"materials": [{"category": "地板", "items": []}]}"#,
        )
        .unwrap();

        let data = ReferenceData::load(dir.path());
        assert!(data.companies.is_empty());
        assert_eq!(data.materials.len(), 1);
    }
}
