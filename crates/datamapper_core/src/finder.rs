//! Deferred-execution finders.
//!
//! # Responsibility
//! - Accumulate a `Query` through chained calls.
//! - Execute it through a data mapper on a terminal call and shape results.
//!
//! # Invariants
//! - Nothing is validated or fetched before `get_item`/`get_items`.
//! - Result shape is decided once per execution: projected records when
//!   columns were requested, materialized entities otherwise.
//! - Only the single-result finder reports "not found"; collections are
//!   empty instead.

use crate::definition::FieldDefinition;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::mapper::DataMapper;
use crate::query::{ColumnSpec, Condition, DirectionSpec, OperatorSpec, OrderBy, Query};
use crate::record::Record;
use crate::value::{Value, NULL};
use log::debug;
use std::time::Instant;

/// One query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Entity(Entity),
    /// Field-keyed projection, keys in requested order.
    Record(Record),
}

impl Item {
    /// Field value by field name, regardless of result shape.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Entity(entity) => entity.get(field),
            Self::Record(record) => record.get(field),
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Entity(_) => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Entity(_) => None,
        }
    }
}

/// Collection result; uniform in shape across all elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Entities(Vec<Entity>),
    Records(Vec<Record>),
}

impl Items {
    pub fn len(&self) -> usize {
        match self {
            Self::Entities(entities) => entities.len(),
            Self::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entities(&self) -> Option<&[Entity]> {
        match self {
            Self::Entities(entities) => Some(entities),
            Self::Records(_) => None,
        }
    }

    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Self::Records(records) => Some(records),
            Self::Entities(_) => None,
        }
    }

    pub fn into_entities(self) -> Option<Vec<Entity>> {
        match self {
            Self::Entities(entities) => Some(entities),
            Self::Records(_) => None,
        }
    }

    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            Self::Records(records) => Some(records),
            Self::Entities(_) => None,
        }
    }

    /// Values of one field across the result, in result order.
    pub fn column(&self, field: &str) -> Vec<Value> {
        match self {
            Self::Entities(entities) => entities
                .iter()
                .map(|entity| entity.get(field).cloned().unwrap_or(Value::Null))
                .collect(),
            Self::Records(records) => records
                .iter()
                .map(|record| record.get(field).cloned().unwrap_or(Value::Null))
                .collect(),
        }
    }

    fn into_first(self) -> Option<Item> {
        match self {
            Self::Entities(entities) => entities.into_iter().next().map(Item::Entity),
            Self::Records(records) => records.into_iter().next().map(Item::Record),
        }
    }
}

/// Finder for at most one result.
pub struct EntityFinder<'f> {
    mapper: &'f dyn DataMapper,
    query: Query,
}

impl<'f> EntityFinder<'f> {
    pub fn new(mapper: &'f dyn DataMapper) -> Self {
        Self {
            mapper,
            query: Query::new(),
        }
    }

    /// Restricts the result to `columns`; `"*"` requests the whole entity.
    pub fn columns(mut self, columns: impl Into<ColumnSpec>) -> Self {
        self.query.columns = columns.into();
        self
    }

    /// Appends a filter; the operator is checked when the query runs.
    pub fn with(
        mut self,
        field: impl Into<String>,
        operator: impl Into<OperatorSpec>,
        value: impl Into<Value>,
    ) -> Self {
        self.query
            .conditions
            .push(Condition::new(field, operator, value));
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Executes the query and returns the first match.
    ///
    /// # Errors
    /// - `EntityNotFound` when nothing matches.
    /// - `InvalidOperator`, `UnknownField`, `InvalidQuery` for malformed queries.
    pub fn get_item(mut self) -> OrmResult<Item> {
        self.query.limit = Some(1);
        self.query.offset = 0;
        let items = execute(self.mapper, &self.query)?;
        items.into_first().ok_or_else(|| OrmError::EntityNotFound {
            entity: self.mapper.entity_name().to_string(),
            criteria: self.query.describe_conditions(),
        })
    }

    /// Like `get_item`, but always materializes the whole entity.
    pub fn get_entity(mut self) -> OrmResult<Entity> {
        self.query.columns = ColumnSpec::All;
        match self.get_item()? {
            Item::Entity(entity) => Ok(entity),
            Item::Record(_) => Err(OrmError::InvalidQuery(
                "entity lookup returned a projection".to_string(),
            )),
        }
    }
}

/// Finder for an ordered, sliceable result sequence.
pub struct CollectionFinder<'f> {
    mapper: &'f dyn DataMapper,
    query: Query,
}

impl<'f> CollectionFinder<'f> {
    pub fn new(mapper: &'f dyn DataMapper) -> Self {
        Self {
            mapper,
            query: Query::new(),
        }
    }

    pub fn columns(mut self, columns: impl Into<ColumnSpec>) -> Self {
        self.query.columns = columns.into();
        self
    }

    pub fn with(
        mut self,
        field: impl Into<String>,
        operator: impl Into<OperatorSpec>,
        value: impl Into<Value>,
    ) -> Self {
        self.query
            .conditions
            .push(Condition::new(field, operator, value));
        self
    }

    /// Sets the ordering key, replacing any earlier one.
    ///
    /// `direction` is a [`Direction`](crate::Direction) or a case-insensitive name (`"asc"`,
    /// `"DESC"`); an unknown name fails with `InvalidQuery` on execution.
    pub fn order_by(
        mut self,
        field: impl Into<String>,
        direction: impl Into<DirectionSpec>,
    ) -> Self {
        self.query.order = Some(OrderBy {
            field: field.into(),
            direction: direction.into(),
        });
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Executes the query; `limit = None` means unbounded.
    ///
    /// Returns an empty collection when nothing matches.
    pub fn get_items(mut self, limit: Option<usize>, offset: usize) -> OrmResult<Items> {
        self.query.limit = limit;
        self.query.offset = offset;
        execute(self.mapper, &self.query)
    }
}

fn execute(mapper: &dyn DataMapper, query: &Query) -> OrmResult<Items> {
    let started_at = Instant::now();
    let result = run(mapper, query);
    match &result {
        Ok(items) => debug!(
            "event=finder_execute module=finder status=ok entity={} rows={} duration_ms={}",
            mapper.entity_name(),
            items.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => debug!(
            "event=finder_execute module=finder status=error entity={} duration_ms={} error={}",
            mapper.entity_name(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn run(mapper: &dyn DataMapper, query: &Query) -> OrmResult<Items> {
    let builder = mapper.builder();
    let definition = builder.definition(mapper.entity_name())?;
    let prepared = query.prepare(definition)?;
    let rows = mapper.fetch(&prepared)?;

    match &prepared.projection {
        None => rows
            .iter()
            .map(|row| builder.build(&prepared.entity, row))
            .collect::<OrmResult<Vec<_>>>()
            .map(Items::Entities),
        Some(fields) => rows
            .iter()
            .map(|row| project(&prepared.entity, fields, row))
            .collect::<OrmResult<Vec<_>>>()
            .map(Items::Records),
    }
}

fn project(entity: &str, fields: &[FieldDefinition], row: &Record) -> OrmResult<Record> {
    let mut projected = Record::with_capacity(fields.len());
    for field in fields {
        let raw = row.get(field.column_name()).unwrap_or(&NULL);
        let value = field.field_type.coerce(raw).map_err(|message| {
            OrmError::build(entity, format!("field `{}`: {message}", field.name))
        })?;
        projected.insert(field.name.clone(), value);
    }
    Ok(projected)
}
