//! Repository façade over one data mapper.
//!
//! # Responsibility
//! - Expose lookup, add, delete and commit for one entity type.
//! - Turn relation handles into scoped repositories.
//!
//! # Invariants
//! - `add` routes blank identities to insert and everything else to update.
//! - A scoped repository filters every finder by its scope and fills unset
//!   scope fields of entities it adds.

use crate::builder::EntityBuilder;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::finder::{CollectionFinder, EntityFinder};
use crate::mapper::{DataMapper, PendingChange};
use crate::query::Operator;
use crate::value::Value;

pub struct Repository<'m> {
    mapper: Box<dyn DataMapper + 'm>,
    /// Equality conditions inherited from a relation.
    scope: Vec<(String, Value)>,
}

impl<'m> Repository<'m> {
    pub fn new(mapper: impl DataMapper + 'm) -> Self {
        Self::from_boxed(Box::new(mapper))
    }

    pub fn from_boxed(mapper: Box<dyn DataMapper + 'm>) -> Self {
        Self {
            mapper,
            scope: Vec::new(),
        }
    }

    fn scoped(mapper: Box<dyn DataMapper + 'm>, scope: Vec<(String, Value)>) -> Self {
        Self { mapper, scope }
    }

    pub fn entity_name(&self) -> &str {
        self.mapper.entity_name()
    }

    pub fn builder(&self) -> &EntityBuilder {
        self.mapper.builder()
    }

    pub fn scope(&self) -> &[(String, Value)] {
        &self.scope
    }

    pub fn pending(&self) -> &[PendingChange] {
        self.mapper.pending()
    }

    /// New, unpersisted entity with defaults and this repository's scope applied.
    pub fn create(&self) -> OrmResult<Entity> {
        let mut entity = self.builder().create(self.entity_name())?;
        self.apply_scope(&mut entity)?;
        Ok(entity)
    }

    /// Fills blank scope fields; the identity is never taken from a scope.
    fn apply_scope(&self, entity: &mut Entity) -> OrmResult<()> {
        if self.scope.is_empty() {
            return Ok(());
        }
        let identity = &self.builder().definition(self.entity_name())?.identity;
        for (field, value) in &self.scope {
            if field != identity && entity.get(field).is_some_and(Value::is_blank) {
                entity.set(field, value.clone())?;
            }
        }
        Ok(())
    }

    /// Loads one entity by identity, within this repository's scope.
    ///
    /// # Errors
    /// - `EntityNotFound` when no record carries `id`.
    pub fn get_by_id(&self, id: impl Into<Value>) -> OrmResult<Entity> {
        let identity = self
            .builder()
            .definition(self.entity_name())?
            .identity
            .clone();
        self.find_one()
            .with(identity, Operator::Equal, id)
            .get_entity()
    }

    /// Fresh single-result finder.
    pub fn find_one(&self) -> EntityFinder<'_> {
        self.scope
            .iter()
            .fold(self.mapper.find_one(), |finder, (field, value)| {
                finder.with(field.as_str(), Operator::Equal, value.clone())
            })
    }

    /// Fresh collection finder.
    pub fn find_all(&self) -> CollectionFinder<'_> {
        self.scope
            .iter()
            .fold(self.mapper.find_all(), |finder, (field, value)| {
                finder.with(field.as_str(), Operator::Equal, value.clone())
            })
    }

    /// Stages `entity` for insert (blank identity) or update.
    ///
    /// A new entity carries its reserved identity when this returns; it is
    /// durable after `commit`.
    pub fn add(&mut self, entity: &mut Entity) -> OrmResult<()> {
        if entity.name() != self.entity_name() {
            return Err(OrmError::EntityMismatch {
                expected: self.entity_name().to_string(),
                actual: entity.name().to_string(),
            });
        }
        self.apply_scope(entity)?;

        if entity.has_identity() {
            self.mapper.update(entity)
        } else {
            self.mapper.insert(entity)
        }
    }

    /// Stages removal of a persisted entity.
    ///
    /// # Errors
    /// - `MissingIdentity` when the entity was never persisted.
    /// - `UnknownIdentity` when no stored record carries its identity.
    pub fn delete(&mut self, entity: &Entity) -> OrmResult<()> {
        self.mapper.delete(entity)
    }

    pub fn commit(&mut self) -> OrmResult<()> {
        self.mapper.commit()
    }

    /// Repository over the records related to `entity` through `name`.
    ///
    /// The scope is taken from the entity's current field values, so an
    /// unsaved change to a reference is followed without reloading anything.
    pub fn relation(&self, entity: &Entity, name: &str) -> OrmResult<Repository<'_>> {
        let handle = self.builder().relation_handle(entity, name)?;
        let mapper = self.mapper.related(&handle.entity)?;
        Ok(Repository::scoped(mapper, handle.scope))
    }
}
