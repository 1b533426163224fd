//! Entity configuration: which entities exist and where their definitions live.
//!
//! The document is a JSON object keyed by entity name:
//!
//! ```json
//! { "Article": { "table": "articles", "definition": "Article" } }
//! ```

use super::DefinitionError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One configured entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntitySection {
    /// Overrides the table named in the definition.
    #[serde(default)]
    pub table: Option<String>,
    /// Definition source name; defaults to the entity name.
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EntityConfig {
    sections: BTreeMap<String, EntitySection>,
}

impl EntityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source).map_err(|source| DefinitionError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn insert(&mut self, entity: impl Into<String>, section: EntitySection) {
        self.sections.insert(entity.into(), section);
    }

    pub fn section(&self, entity: &str) -> Option<&EntitySection> {
        self.sections.get(entity)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Definition source for `entity`.
    pub fn source_name<'a>(&'a self, entity: &'a str) -> &'a str {
        self.section(entity)
            .and_then(|section| section.definition.as_deref())
            .unwrap_or(entity)
    }
}
