//! In-process data mapper over shared row vectors.

use super::{log_commit, CommittedState, DataMapper, IdentitySequence, PendingChange, UnitOfWork};
use crate::builder::EntityBuilder;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::query::PreparedQuery;
use crate::record::Record;
use crate::value::{Value, NULL};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

/// Column-keyed tables shared by every mapper cloned from one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Rc<RefCell<BTreeMap<String, Vec<Record>>>>,
    sequence: IdentitySequence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw rows to `table`, bypassing staging.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Record>) {
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of the committed rows of `table`, in commit order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .borrow()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn max_identity(&self, table: &str, column: &str) -> i64 {
        self.tables
            .borrow()
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(column).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
    }

    fn contains_identity(&self, table: &str, column: &str, id: &Value) -> bool {
        self.tables
            .borrow()
            .get(table)
            .into_iter()
            .flatten()
            .any(|row| row.get(column).is_some_and(|stored| stored.matches(id)))
    }

    /// Applies `changes` to a copy of `table` and swaps it in on success.
    fn apply(
        &self,
        entity: &str,
        table: &str,
        column: &str,
        changes: &[PendingChange],
    ) -> OrmResult<()> {
        let mut rows = self.rows(table);
        let position = |rows: &[Record], id: &Value| {
            rows.iter()
                .position(|row| row.get(column).is_some_and(|stored| stored.matches(id)))
        };

        for change in changes {
            match change {
                PendingChange::Insert { id, record } => {
                    if position(&rows, id).is_some() {
                        return Err(OrmError::DuplicateIdentity {
                            entity: entity.to_string(),
                            id: id.clone(),
                        });
                    }
                    rows.push(record.clone());
                }
                PendingChange::Update { id, record } => match position(&rows, id) {
                    Some(index) => rows[index] = record.clone(),
                    None => return Err(unknown_identity(entity, id)),
                },
                PendingChange::Delete { id } => match position(&rows, id) {
                    Some(index) => {
                        rows.remove(index);
                    }
                    None => return Err(unknown_identity(entity, id)),
                },
            }
        }

        self.tables.borrow_mut().insert(table.to_string(), rows);
        Ok(())
    }
}

fn unknown_identity(entity: &str, id: &Value) -> OrmError {
    OrmError::UnknownIdentity {
        entity: entity.to_string(),
        id: id.clone(),
    }
}

/// Data mapper that evaluates queries in Rust against a `MemoryStore`.
#[derive(Debug)]
pub struct MemoryDataMapper {
    entity: String,
    table: String,
    identity_column: String,
    builder: EntityBuilder,
    store: MemoryStore,
    work: UnitOfWork,
}

impl MemoryDataMapper {
    /// Fails with `UnknownEntity` when `entity` has no definition.
    pub fn new(builder: EntityBuilder, entity: &str, store: MemoryStore) -> OrmResult<Self> {
        let definition = builder.definition(entity)?;
        let entity = definition.name.clone();
        let table = definition.table.clone();
        let identity_column = definition.identity_column().to_string();
        let work = UnitOfWork::new(entity.clone(), store.sequence.clone());
        Ok(Self {
            entity,
            table,
            identity_column,
            builder,
            store,
            work,
        })
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

struct CommittedTable<'a> {
    store: &'a MemoryStore,
    table: &'a str,
    column: &'a str,
}

impl CommittedState for CommittedTable<'_> {
    fn max_identity(&self) -> OrmResult<i64> {
        Ok(self.store.max_identity(self.table, self.column))
    }

    fn contains_identity(&self, id: &Value) -> OrmResult<bool> {
        Ok(self.store.contains_identity(self.table, self.column, id))
    }
}

impl DataMapper for MemoryDataMapper {
    fn entity_name(&self) -> &str {
        &self.entity
    }

    fn builder(&self) -> &EntityBuilder {
        &self.builder
    }

    /// Rows come back in identity order unless the query orders them.
    fn fetch(&self, query: &PreparedQuery) -> OrmResult<Vec<Record>> {
        let tables = self.store.tables.borrow();
        let mut rows: Vec<&Record> = tables.get(&self.table).into_iter().flatten().collect();
        rows.sort_by(|left, right| {
            let left = left.get(&self.identity_column).unwrap_or(&NULL);
            let right = right.get(&self.identity_column).unwrap_or(&NULL);
            left.sort_cmp(right)
        });
        Ok(query.evaluate(rows))
    }

    fn insert(&mut self, entity: &mut Entity) -> OrmResult<()> {
        let committed = CommittedTable {
            store: &self.store,
            table: &self.table,
            column: &self.identity_column,
        };
        self.work.stage_insert(&self.builder, entity, &committed)
    }

    fn update(&mut self, entity: &mut Entity) -> OrmResult<()> {
        let committed = CommittedTable {
            store: &self.store,
            table: &self.table,
            column: &self.identity_column,
        };
        self.work.stage_update(&self.builder, entity, &committed)
    }

    fn delete(&mut self, entity: &Entity) -> OrmResult<()> {
        let committed = CommittedTable {
            store: &self.store,
            table: &self.table,
            column: &self.identity_column,
        };
        self.work.stage_delete(&self.builder, entity, &committed)
    }

    fn commit(&mut self) -> OrmResult<()> {
        let changes = self.work.take();
        if changes.is_empty() {
            return Ok(());
        }
        let started_at = Instant::now();
        let result = self
            .store
            .apply(&self.entity, &self.table, &self.identity_column, &changes);
        log_commit("memory", &self.entity, changes.len(), started_at, &result);
        result
    }

    fn pending(&self) -> &[PendingChange] {
        self.work.pending()
    }

    fn related(&self, entity: &str) -> OrmResult<Box<dyn DataMapper + '_>> {
        let mapper = MemoryDataMapper::new(self.builder.clone(), entity, self.store.clone())?;
        Ok(Box::new(mapper))
    }
}
