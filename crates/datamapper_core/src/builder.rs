//! Entity materialization from storage rows.
//!
//! # Responsibility
//! - Turn column-keyed rows into typed entities and back.
//! - Attach lazily bound relation handles.
//!
//! # Invariants
//! - Unknown columns in a row are ignored.
//! - A required field without a value is a build failure, on read and on write.
//! - The builder never performs storage I/O.

use crate::definition::{
    DefinitionRegistry, EntityConfig, EntityDefinition, Locator, RelationDefinition, RelationKind,
};
use crate::entity::{Entity, RelationHandle};
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::{Value, NULL};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cheap to clone; clones share one definition registry.
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    registry: Arc<DefinitionRegistry>,
}

impl EntityBuilder {
    pub fn new(registry: Arc<DefinitionRegistry>) -> Self {
        Self { registry }
    }

    /// Loads a registry through `locator` and wraps it in a builder.
    pub fn load(locator: &Locator, config: &EntityConfig) -> OrmResult<Self> {
        let registry = DefinitionRegistry::load(locator, config)?;
        Ok(Self::new(Arc::new(registry)))
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Registered definition for `entity`.
    ///
    /// # Errors
    /// - `UnknownEntity` when no definition is registered under that name.
    pub fn definition(&self, entity: &str) -> OrmResult<&EntityDefinition> {
        self.registry
            .get(entity)
            .map_err(|_| OrmError::UnknownEntity(entity.to_string()))
    }

    /// Returns a new, unpersisted entity with defaults applied.
    pub fn create(&self, entity: &str) -> OrmResult<Entity> {
        let definition = self.definition(entity)?;
        let fields = definition
            .fields
            .iter()
            .map(|field| {
                let value = match (&field.default, field.name == definition.identity) {
                    (Some(default), false) => field
                        .field_type
                        .coerce(default)
                        .map_err(|message| OrmError::build(entity, message))?,
                    _ => Value::Null,
                };
                Ok((field.name.clone(), value))
            })
            .collect::<OrmResult<BTreeMap<_, _>>>()?;
        Ok(Entity::new(
            definition.name.clone(),
            definition.identity.clone(),
            fields,
        ))
    }

    /// Materializes a column-keyed storage row.
    pub fn build(&self, entity: &str, row: &Record) -> OrmResult<Entity> {
        let definition = self.definition(entity)?;
        let mut fields = BTreeMap::new();

        for field in &definition.fields {
            let raw = row.get(field.column_name()).unwrap_or(&NULL);
            let value = field.field_type.coerce(raw).map_err(|message| {
                OrmError::build(entity, format!("field `{}`: {message}", field.name))
            })?;
            if value.is_null() && field.required {
                return Err(OrmError::build(
                    entity,
                    format!("required field `{}` is missing", field.name),
                ));
            }
            fields.insert(field.name.clone(), value);
        }

        let mut built = Entity::new(
            definition.name.clone(),
            definition.identity.clone(),
            fields,
        );
        self.resolve(&mut built)?;
        Ok(built)
    }

    /// Back-fills defaults and attaches relation handles.
    ///
    /// `has_many`/`has_one` handles are only attached once the entity has an
    /// identity; before that there is nothing they could point at.
    pub fn resolve(&self, entity: &mut Entity) -> OrmResult<()> {
        let definition = self.definition(entity.name())?;

        for field in &definition.fields {
            let Some(default) = &field.default else {
                continue;
            };
            if field.name != definition.identity
                && entity.get(&field.name).is_some_and(Value::is_null)
            {
                let value = field
                    .field_type
                    .coerce(default)
                    .map_err(|message| OrmError::build(entity.name(), message))?;
                entity.set(&field.name, value)?;
            }
        }

        for relation in &definition.relations {
            let needs_identity = relation.kind != RelationKind::BelongsTo;
            if needs_identity && !entity.has_identity() {
                continue;
            }
            let handle = self.handle_for(entity, relation)?;
            entity.set_relation(handle);
        }

        Ok(())
    }

    /// Builds the handle for relation `name`, whether or not it is attached yet.
    pub fn relation_handle(&self, entity: &Entity, name: &str) -> OrmResult<RelationHandle> {
        let definition = self.definition(entity.name())?;
        let relation = definition
            .relation(name)
            .ok_or_else(|| OrmError::UnknownRelation {
                entity: entity.name().to_string(),
                relation: name.to_string(),
            })?;
        if relation.kind != RelationKind::BelongsTo && !entity.has_identity() {
            return Err(OrmError::MissingIdentity {
                entity: entity.name().to_string(),
            });
        }
        self.handle_for(entity, relation)
    }

    fn handle_for(
        &self,
        entity: &Entity,
        relation: &RelationDefinition,
    ) -> OrmResult<RelationHandle> {
        let scope = match relation.kind {
            RelationKind::HasMany | RelationKind::HasOne => {
                vec![(relation.reference.clone(), entity.id().clone())]
            }
            RelationKind::BelongsTo => {
                let target = self.definition(&relation.entity)?;
                let key = entity
                    .get(&relation.reference)
                    .cloned()
                    .unwrap_or(Value::Null);
                vec![(target.identity.clone(), key)]
            }
        };
        Ok(RelationHandle {
            name: relation.name.clone(),
            kind: relation.kind,
            entity: relation.entity.clone(),
            scope,
        })
    }

    /// Converts an entity into a column-keyed storage row, in definition order.
    pub fn extract(&self, entity: &Entity) -> OrmResult<Record> {
        let definition = self.definition(entity.name())?;
        let mut row = Record::with_capacity(definition.fields.len());

        for field in &definition.fields {
            let raw = entity.get(&field.name).unwrap_or(&NULL);
            let value = field.field_type.coerce(raw).map_err(|message| {
                OrmError::build(entity.name(), format!("field `{}`: {message}", field.name))
            })?;
            if value.is_null() && field.required {
                return Err(OrmError::build(
                    entity.name(),
                    format!("required field `{}` is missing", field.name),
                ));
            }
            row.insert(field.column_name(), value);
        }

        Ok(row)
    }
}
