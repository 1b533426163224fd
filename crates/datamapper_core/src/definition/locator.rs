//! Definition discovery strategies.
//!
//! # Responsibility
//! - Map an entity (or definition source) name to a definition file.
//! - Enumerate every definition a strategy can see.
//!
//! # Invariants
//! - Strategies are consulted in registration order; the first hit wins.
//! - Directory scans are sorted by file name so lookups are deterministic.

use super::{DefinitionError, EntityDefinition};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFINITION_EXTENSION: &str = "json";

/// One way of finding definition sources.
pub trait LocatorStrategy: Send + Sync {
    /// Returns the definition file for `name`, if this strategy knows one.
    fn locate(&self, name: &str) -> Option<PathBuf>;
    /// Lists `(name, path)` for every definition this strategy can see.
    fn enumerate(&self) -> Vec<(String, PathBuf)>;
}

/// Scans a directory tree for `<Name>.json` files.
#[derive(Debug, Clone)]
pub struct RecursiveDirectoryStrategy {
    root: PathBuf,
}

impl RecursiveDirectoryStrategy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn definition_files(&self) -> impl Iterator<Item = (String, PathBuf)> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.into_path();
                if path.extension()?.to_str()? != DEFINITION_EXTENSION {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
    }
}

impl LocatorStrategy for RecursiveDirectoryStrategy {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.definition_files()
            .find(|(stem, _)| stem == name)
            .map(|(_, path)| path)
    }

    fn enumerate(&self) -> Vec<(String, PathBuf)> {
        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for (stem, path) in self.definition_files() {
            if !found.iter().any(|(existing, _)| *existing == stem) {
                found.push((stem, path));
            }
        }
        found
    }
}

/// Explicit name to file mapping.
#[derive(Debug, Clone, Default)]
pub struct MapStrategy {
    paths: BTreeMap<String, PathBuf>,
}

impl MapStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(name.into(), path.into());
        self
    }
}

impl LocatorStrategy for MapStrategy {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.paths.get(name).cloned()
    }

    fn enumerate(&self) -> Vec<(String, PathBuf)> {
        self.paths
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect()
    }
}

/// Ordered set of strategies.
#[derive(Default)]
pub struct Locator {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl Locator {
    pub fn new(strategies: Vec<Box<dyn LocatorStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn with_strategy(mut self, strategy: impl LocatorStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.locate(name))
    }

    /// Every visible definition source; earlier strategies shadow later ones.
    pub fn enumerate(&self) -> Vec<(String, PathBuf)> {
        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for strategy in &self.strategies {
            for (name, path) in strategy.enumerate() {
                if !found.iter().any(|(existing, _)| *existing == name) {
                    found.push((name, path));
                }
            }
        }
        found
    }

    /// Locates and parses the definition source called `name`.
    pub fn load(&self, name: &str) -> Result<EntityDefinition, DefinitionError> {
        let path = self
            .find_file(name)
            .ok_or_else(|| DefinitionError::NotFound(name.to_string()))?;
        read_definition(&path)
    }
}

pub(crate) fn read_definition(path: &Path) -> Result<EntityDefinition, DefinitionError> {
    let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EntityDefinition::from_json_str(&source).map_err(|source| DefinitionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{Locator, LocatorStrategy, MapStrategy, RecursiveDirectoryStrategy};
    use crate::definition::DefinitionError;
    use std::fs;

    const TAG: &str = r#"{ "name": "Tag", "fields": [ { "name": "id", "type": "integer" } ] }"#;

    #[test]
    fn directory_strategy_finds_nested_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("content").join("meta");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Tag.json"), TAG).unwrap();
        fs::write(nested.join("notes.txt"), "ignored").unwrap();

        let strategy = RecursiveDirectoryStrategy::new(dir.path());
        assert_eq!(strategy.locate("Tag"), Some(nested.join("Tag.json")));
        assert_eq!(strategy.locate("notes"), None);
        assert_eq!(strategy.enumerate().len(), 1);
    }

    #[test]
    fn first_strategy_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Tag.json"), TAG).unwrap();
        let override_path = dir.path().join("override.json");
        fs::write(&override_path, TAG).unwrap();

        let locator = Locator::default()
            .with_strategy(MapStrategy::new().with("Tag", &override_path))
            .with_strategy(RecursiveDirectoryStrategy::new(dir.path()));

        assert_eq!(locator.find_file("Tag"), Some(override_path));
        let names: Vec<String> = locator.enumerate().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Tag".to_string(), "override".to_string()]);
    }

    #[test]
    fn load_reports_missing_and_malformed_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Broken.json"), "{ not json").unwrap();
        let locator = Locator::default().with_strategy(RecursiveDirectoryStrategy::new(dir.path()));

        assert!(matches!(locator.load("Missing"), Err(DefinitionError::NotFound(_))));
        assert!(matches!(locator.load("Broken"), Err(DefinitionError::Parse { .. })));
    }
}
