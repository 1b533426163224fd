//! Process-wide definition cache.
//!
//! # Invariants
//! - Populated once at startup, read-only afterwards (share it behind `Arc`).
//! - Every relation targets a registered entity and a declared field.

use super::{DefinitionError, EntityConfig, EntityDefinition, Locator, RelationKind};
use log::{error, info};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, EntityDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every configured entity, or every visible source when `config` is empty.
    ///
    /// # Side effects
    /// - Reads definition files through `locator`.
    /// - Emits `definitions_load` logging events with duration and status.
    pub fn load(locator: &Locator, config: &EntityConfig) -> Result<Self, DefinitionError> {
        let started_at = Instant::now();
        info!("event=definitions_load module=definition status=start");

        match Self::load_inner(locator, config) {
            Ok(registry) => {
                info!(
                    "event=definitions_load module=definition status=ok entities={} duration_ms={}",
                    registry.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(registry)
            }
            Err(err) => {
                error!(
                    "event=definitions_load module=definition status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn load_inner(locator: &Locator, config: &EntityConfig) -> Result<Self, DefinitionError> {
        let mut registry = Self::new();

        if config.is_empty() {
            for (_, path) in locator.enumerate() {
                registry.insert(super::locator::read_definition(&path)?)?;
            }
        } else {
            for entity in config.entity_names() {
                let mut definition = locator.load(config.source_name(entity))?;
                definition.name = entity.to_string();
                if let Some(table) = config.section(entity).and_then(|s| s.table.clone()) {
                    definition.table = table;
                }
                registry.insert(definition)?;
            }
        }

        registry.validate_relations()?;
        Ok(registry)
    }

    /// Registers one definition after validating it.
    pub fn register(&mut self, definition: EntityDefinition) -> Result<(), DefinitionError> {
        let name = definition.name.clone();
        self.insert(definition)?;
        if let Err(err) = self.validate_relations() {
            self.definitions.remove(&name);
            return Err(err);
        }
        Ok(())
    }

    fn insert(&mut self, definition: EntityDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.definitions.contains_key(&definition.name) {
            return Err(DefinitionError::invalid(
                &definition.name,
                "entity is defined twice",
            ));
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&EntityDefinition, DefinitionError> {
        self.definitions
            .get(name)
            .ok_or_else(|| DefinitionError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn validate_relations(&self) -> Result<(), DefinitionError> {
        for definition in self.definitions.values() {
            for relation in &definition.relations {
                let target = self.definitions.get(&relation.entity).ok_or_else(|| {
                    DefinitionError::invalid(
                        &definition.name,
                        format!(
                            "relation `{}` targets unknown entity `{}`",
                            relation.name, relation.entity
                        ),
                    )
                })?;
                let reference_owner = match relation.kind {
                    RelationKind::HasMany | RelationKind::HasOne => target,
                    RelationKind::BelongsTo => definition,
                };
                if reference_owner.field(&relation.reference).is_none() {
                    return Err(DefinitionError::invalid(
                        &definition.name,
                        format!(
                            "relation `{}` references unknown field `{}.{}`",
                            relation.name, reference_owner.name, relation.reference
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}
