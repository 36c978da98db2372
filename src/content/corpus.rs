//! JSON interchange format for a whole content corpus.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ContentItem, ItemId, TermId};
use crate::error::Result;

/// Taxonomy declaration. List order is the registration order for every kind
/// the taxonomy is attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyDef {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kinds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDef {
    pub id: TermId,
    pub taxonomy: String,
    pub name: String,
}

/// Terms assigned to one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub item: ItemId,
    pub terms: Vec<TermId>,
}

/// Items, taxonomies, terms and term assignments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub taxonomies: Vec<TaxonomyDef>,
    #[serde(default)]
    pub terms: Vec<TermDef>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl Corpus {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
