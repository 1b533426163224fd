//! Data mapper contract and backends.
//!
//! # Responsibility
//! - Define the storage boundary used by repositories and finders.
//! - Stage entity writes until an explicit commit.
//!
//! # Invariants
//! - Staged changes are invisible to `fetch` until `commit` succeeds.
//! - A commit applies all staged changes or none of them; the staged batch
//!   is discarded either way.
//! - Identities are reserved when an insert is staged, so a new entity
//!   carries its identity immediately.

use crate::builder::EntityBuilder;
use crate::definition::{EntityDefinition, FieldType};
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::finder::{CollectionFinder, EntityFinder};
use crate::query::{Operator, PreparedQuery};
use crate::record::Record;
use crate::value::Value;
use log::{debug, error, info};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

mod memory;
mod sqlite;

pub use memory::{MemoryDataMapper, MemoryStore};
pub use sqlite::{SqliteDataMapper, SqliteStore};

/// Backend adapter for one entity type.
pub trait DataMapper {
    /// Entity type handled by this mapper.
    fn entity_name(&self) -> &str;

    fn builder(&self) -> &EntityBuilder;

    /// Returns committed, column-keyed rows matching `query`, filtered,
    /// ordered and sliced.
    fn fetch(&self, query: &PreparedQuery) -> OrmResult<Vec<Record>>;

    /// Stages an insert and assigns the entity's identity.
    fn insert(&mut self, entity: &mut Entity) -> OrmResult<()>;

    fn update(&mut self, entity: &mut Entity) -> OrmResult<()>;

    fn delete(&mut self, entity: &Entity) -> OrmResult<()>;

    /// Flushes staged changes atomically.
    fn commit(&mut self) -> OrmResult<()>;

    /// Changes staged since the last commit, in staging order.
    fn pending(&self) -> &[PendingChange];

    /// Mapper for another entity type on the same storage.
    fn related(&self, entity: &str) -> OrmResult<Box<dyn DataMapper + '_>>;
}

impl<'m> dyn DataMapper + 'm {
    pub fn find_one(&self) -> EntityFinder<'_> {
        EntityFinder::new(self)
    }

    pub fn find_all(&self) -> CollectionFinder<'_> {
        CollectionFinder::new(self)
    }

    /// Loads one entity by identity.
    ///
    /// # Errors
    /// - `EntityNotFound` when no record carries `id`.
    pub fn get_by_id(&self, id: impl Into<Value>) -> OrmResult<Entity> {
        let identity = self.builder().definition(self.entity_name())?.identity.clone();
        self.find_one()
            .with(identity, Operator::Equal, id)
            .get_entity()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Insert { id: Value, record: Record },
    Update { id: Value, record: Record },
    Delete { id: Value },
}

impl PendingChange {
    pub fn id(&self) -> &Value {
        match self {
            Self::Insert { id, .. } | Self::Update { id, .. } | Self::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Last reserved identity per table, shared by mappers over one storage.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdentitySequence {
    reserved: Rc<RefCell<BTreeMap<String, i64>>>,
}

impl IdentitySequence {
    pub(crate) fn next(&self, table: &str, committed_max: i64) -> i64 {
        let mut reserved = self.reserved.borrow_mut();
        let last = reserved.entry(table.to_string()).or_insert(0);
        *last = (*last).max(committed_max) + 1;
        *last
    }
}

/// Committed-state lookups a backend provides to the unit of work.
pub(crate) trait CommittedState {
    fn max_identity(&self) -> OrmResult<i64>;
    fn contains_identity(&self, id: &Value) -> OrmResult<bool>;
}

/// Staged changes for one mapper.
#[derive(Debug)]
pub(crate) struct UnitOfWork {
    entity: String,
    sequence: IdentitySequence,
    changes: Vec<PendingChange>,
}

impl UnitOfWork {
    pub(crate) fn new(entity: impl Into<String>, sequence: IdentitySequence) -> Self {
        Self {
            entity: entity.into(),
            sequence,
            changes: Vec::new(),
        }
    }

    pub(crate) fn sequence(&self) -> &IdentitySequence {
        &self.sequence
    }

    pub(crate) fn pending(&self) -> &[PendingChange] {
        &self.changes
    }

    pub(crate) fn take(&mut self) -> Vec<PendingChange> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn stage_insert(
        &mut self,
        builder: &EntityBuilder,
        entity: &mut Entity,
        committed: &dyn CommittedState,
    ) -> OrmResult<()> {
        self.ensure_handles(entity)?;
        let definition = builder.definition(entity.name())?;
        let mut record = builder.extract(entity)?;

        let id = if entity.has_identity() {
            let id = identity_value(definition, entity.id())?;
            if self.is_staged_insert(&id) || committed.contains_identity(&id)? {
                return Err(OrmError::DuplicateIdentity {
                    entity: self.entity.clone(),
                    id,
                });
            }
            id
        } else {
            let max = committed.max_identity()?;
            Value::Integer(self.sequence.next(&definition.table, max))
        };

        record.insert(definition.identity_column(), id.clone());
        write_back(definition, entity, &record)?;
        builder.resolve(entity)?;
        self.push(PendingChange::Insert { id, record });
        Ok(())
    }

    pub(crate) fn stage_update(
        &mut self,
        builder: &EntityBuilder,
        entity: &mut Entity,
        committed: &dyn CommittedState,
    ) -> OrmResult<()> {
        self.ensure_handles(entity)?;
        let definition = builder.definition(entity.name())?;
        let id = self.known_identity(definition, entity, committed)?;
        let record = builder.extract(entity)?;
        write_back(definition, entity, &record)?;

        let staged_insert = self.changes.iter_mut().find_map(|change| match change {
            PendingChange::Insert { id: staged, record } if *staged == id => Some(record),
            _ => None,
        });
        if let Some(staged) = staged_insert {
            *staged = record;
            return Ok(());
        }
        self.push(PendingChange::Update { id, record });
        Ok(())
    }

    pub(crate) fn stage_delete(
        &mut self,
        builder: &EntityBuilder,
        entity: &Entity,
        committed: &dyn CommittedState,
    ) -> OrmResult<()> {
        self.ensure_handles(entity)?;
        let definition = builder.definition(entity.name())?;
        let id = self.known_identity(definition, entity, committed)?;

        let discard_insert = self.is_staged_insert(&id);
        self.changes.retain(|change| *change.id() != id);
        if discard_insert {
            debug!(
                "event=mapper_stage module=mapper status=ok entity={} change=discard_insert id={}",
                self.entity, id
            );
            return Ok(());
        }
        self.push(PendingChange::Delete { id });
        Ok(())
    }

    fn push(&mut self, change: PendingChange) {
        debug!(
            "event=mapper_stage module=mapper status=ok entity={} change={} id={}",
            self.entity,
            change.kind(),
            change.id()
        );
        self.changes.push(change);
    }

    fn ensure_handles(&self, entity: &Entity) -> OrmResult<()> {
        if entity.name() != self.entity {
            return Err(OrmError::EntityMismatch {
                expected: self.entity.clone(),
                actual: entity.name().to_string(),
            });
        }
        Ok(())
    }

    fn is_staged_insert(&self, id: &Value) -> bool {
        self.changes
            .iter()
            .any(|change| matches!(change, PendingChange::Insert { id: staged, .. } if staged == id))
    }

    fn is_staged_delete(&self, id: &Value) -> bool {
        self.changes
            .iter()
            .any(|change| matches!(change, PendingChange::Delete { id: staged } if staged == id))
    }

    /// Identity of an entity that exists, staged or committed.
    fn known_identity(
        &self,
        definition: &EntityDefinition,
        entity: &Entity,
        committed: &dyn CommittedState,
    ) -> OrmResult<Value> {
        if !entity.has_identity() {
            return Err(OrmError::MissingIdentity {
                entity: self.entity.clone(),
            });
        }
        let id = identity_value(definition, entity.id())?;
        let exists = !self.is_staged_delete(&id)
            && (self.is_staged_insert(&id) || committed.contains_identity(&id)?);
        if !exists {
            return Err(OrmError::UnknownIdentity {
                entity: self.entity.clone(),
                id,
            });
        }
        Ok(id)
    }
}

fn identity_value(definition: &EntityDefinition, raw: &Value) -> OrmResult<Value> {
    FieldType::Integer
        .coerce(raw)
        .map_err(|message| OrmError::build(&definition.name, format!("identity: {message}")))
}

/// Copies coerced storage values back so the entity equals what a reload returns.
fn write_back(definition: &EntityDefinition, entity: &mut Entity, record: &Record) -> OrmResult<()> {
    for field in &definition.fields {
        if let Some(value) = record.get(field.column_name()) {
            entity.set(&field.name, value.clone())?;
        }
    }
    Ok(())
}

pub(crate) fn log_commit(
    backend: &str,
    entity: &str,
    changes: usize,
    started_at: Instant,
    result: &OrmResult<()>,
) {
    match result {
        Ok(()) => info!(
            "event=mapper_commit module=mapper status=ok backend={} entity={} changes={} duration_ms={}",
            backend,
            entity,
            changes,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=mapper_commit module=mapper status=error backend={} entity={} changes={} duration_ms={} error={}",
            backend,
            entity,
            changes,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}
