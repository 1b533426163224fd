//! SQLite-backed data mapper.
//!
//! # Responsibility
//! - Translate prepared queries into parameterised SQL.
//! - Flush staged changes inside one transaction.
//!
//! # Invariants
//! - Every value reaches SQL as a bound parameter; identifiers are quoted.
//! - String operators run against `CAST(column AS TEXT)`, case-sensitive.
//! - Without an explicit ordering rows come back in identity order; the
//!   identity column aliases `rowid`.

use super::{log_commit, CommittedState, DataMapper, IdentitySequence, PendingChange, UnitOfWork};
use crate::builder::EntityBuilder;
use crate::db::{ensure_table, quote_identifier, register_functions};
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::query::{Direction, Filter, Operator, PreparedQuery};
use crate::record::Record;
use crate::value::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::time::Instant;

/// One SQLite connection plus the identity reservations of every mapper
/// built on it. Clones share both.
#[derive(Debug, Clone)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
    sequence: IdentitySequence,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            sequence: IdentitySequence::default(),
        }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

pub struct SqliteDataMapper<'conn> {
    store: SqliteStore<'conn>,
    entity: String,
    table: String,
    identity_column: String,
    /// Every mapped column, in definition order.
    columns: Vec<String>,
    builder: EntityBuilder,
    work: UnitOfWork,
}

impl<'conn> SqliteDataMapper<'conn> {
    /// Binds a mapper for `entity` to the store's connection.
    ///
    /// Creates the entity table when missing and registers `regexp()`.
    /// Mappers that stage inserts into the same table must share one store,
    /// otherwise their reserved identities collide at commit.
    pub fn new(builder: EntityBuilder, entity: &str, store: SqliteStore<'conn>) -> OrmResult<Self> {
        let conn = store.conn;
        let definition = builder.definition(entity)?;
        register_functions(conn)?;
        ensure_table(conn, definition)?;

        let entity = definition.name.clone();
        let table = definition.table.clone();
        let identity_column = definition.identity_column().to_string();
        let columns = definition
            .fields
            .iter()
            .map(|field| field.column_name().to_string())
            .collect();
        let work = UnitOfWork::new(entity.clone(), store.sequence.clone());

        Ok(Self {
            store,
            entity,
            table,
            identity_column,
            columns,
            builder,
            work,
        })
    }

    fn committed<'c>(conn: &'c Connection, table: &str, identity_column: &str) -> CommittedSql<'c> {
        CommittedSql {
            conn,
            table: quote_identifier(table),
            identity_column: quote_identifier(identity_column),
        }
    }

    fn select_sql(&self, query: &PreparedQuery) -> (String, Vec<String>, Vec<SqlValue>) {
        let selected: Vec<String> = match &query.projection {
            Some(fields) => fields
                .iter()
                .map(|field| field.column_name().to_string())
                .collect(),
            None => self.columns.clone(),
        };
        let column_list = selected
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "SELECT {column_list} FROM {} WHERE 1 = 1",
            quote_identifier(&self.table)
        );
        let mut bind_values = Vec::new();

        for filter in &query.filters {
            sql.push_str(" AND ");
            push_filter(&mut sql, &mut bind_values, filter);
        }

        match &query.order {
            Some(order) => {
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY {} {direction}, rowid ASC",
                    quote_identifier(&order.column)
                ));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            bind_values.push(SqlValue::Integer(to_i64(limit)));
            bind_values.push(SqlValue::Integer(to_i64(query.offset)));
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(SqlValue::Integer(to_i64(query.offset)));
        }

        (sql, selected, bind_values)
    }

    fn apply(&self, changes: &[PendingChange]) -> OrmResult<()> {
        let tx = self.store.conn.unchecked_transaction()?;
        let table = quote_identifier(&self.table);
        let identity_column = quote_identifier(&self.identity_column);
        let committed = Self::committed(&tx, &self.table, &self.identity_column);

        for change in changes {
            match change {
                PendingChange::Insert { id, record } => {
                    if committed.contains_identity(id)? {
                        return Err(OrmError::DuplicateIdentity {
                            entity: self.entity.clone(),
                            id: id.clone(),
                        });
                    }
                    let columns = record
                        .keys()
                        .map(quote_identifier)
                        .collect::<Vec<_>>()
                        .join(", ");
                    let placeholders = vec!["?"; record.len()].join(", ");
                    tx.execute(
                        &format!("INSERT INTO {table} ({columns}) VALUES ({placeholders});"),
                        params_from_iter(record.iter().map(|(_, value)| to_sql(value))),
                    )?;
                }
                PendingChange::Update { id, record } => {
                    let assignments: Vec<(&str, &Value)> = record
                        .iter()
                        .filter(|(column, _)| *column != self.identity_column)
                        .collect();
                    let exists = if assignments.is_empty() {
                        committed.contains_identity(id)?
                    } else {
                        let set_clause = assignments
                            .iter()
                            .map(|(column, _)| format!("{} = ?", quote_identifier(column)))
                            .collect::<Vec<_>>()
                            .join(", ");
                        let bind_values = assignments
                            .iter()
                            .map(|(_, value)| to_sql(value))
                            .chain(std::iter::once(to_sql(id)));
                        let changed = tx.execute(
                            &format!(
                                "UPDATE {table} SET {set_clause} WHERE {identity_column} = ?;"
                            ),
                            params_from_iter(bind_values),
                        )?;
                        changed > 0
                    };
                    if !exists {
                        return Err(self.unknown_identity(id));
                    }
                }
                PendingChange::Delete { id } => {
                    let changed = tx.execute(
                        &format!("DELETE FROM {table} WHERE {identity_column} = ?1;"),
                        [to_sql(id)],
                    )?;
                    if changed == 0 {
                        return Err(self.unknown_identity(id));
                    }
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn unknown_identity(&self, id: &Value) -> OrmError {
        OrmError::UnknownIdentity {
            entity: self.entity.clone(),
            id: id.clone(),
        }
    }
}

/// Committed-state lookups against the live table.
struct CommittedSql<'c> {
    conn: &'c Connection,
    table: String,
    identity_column: String,
}

impl CommittedState for CommittedSql<'_> {
    fn max_identity(&self) -> OrmResult<i64> {
        let max = self.conn.query_row(
            &format!(
                "SELECT COALESCE(MAX({}), 0) FROM {};",
                self.identity_column, self.table
            ),
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(max)
    }

    fn contains_identity(&self, id: &Value) -> OrmResult<bool> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1;",
                    self.table, self.identity_column
                ),
                [to_sql(id)],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl DataMapper for SqliteDataMapper<'_> {
    fn entity_name(&self) -> &str {
        &self.entity
    }

    fn builder(&self) -> &EntityBuilder {
        &self.builder
    }

    fn fetch(&self, query: &PreparedQuery) -> OrmResult<Vec<Record>> {
        let (sql, selected, bind_values) = self.select_sql(query);
        let mut stmt = self.store.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let mut record = Record::with_capacity(selected.len());
            for (index, column) in selected.iter().enumerate() {
                record.insert(column.as_str(), from_sql(row.get_ref(index)?));
            }
            records.push(record);
        }

        Ok(records)
    }

    fn insert(&mut self, entity: &mut Entity) -> OrmResult<()> {
        let committed = Self::committed(self.store.conn, &self.table, &self.identity_column);
        self.work.stage_insert(&self.builder, entity, &committed)
    }

    fn update(&mut self, entity: &mut Entity) -> OrmResult<()> {
        let committed = Self::committed(self.store.conn, &self.table, &self.identity_column);
        self.work.stage_update(&self.builder, entity, &committed)
    }

    fn delete(&mut self, entity: &Entity) -> OrmResult<()> {
        let committed = Self::committed(self.store.conn, &self.table, &self.identity_column);
        self.work.stage_delete(&self.builder, entity, &committed)
    }

    fn commit(&mut self) -> OrmResult<()> {
        let changes = self.work.take();
        if changes.is_empty() {
            return Ok(());
        }
        let started_at = Instant::now();
        let result = self.apply(&changes);
        log_commit("sqlite", &self.entity, changes.len(), started_at, &result);
        result
    }

    fn pending(&self) -> &[PendingChange] {
        self.work.pending()
    }

    fn related(&self, entity: &str) -> OrmResult<Box<dyn DataMapper + '_>> {
        let mapper = SqliteDataMapper::new(self.builder.clone(), entity, self.store.clone())?;
        Ok(Box::new(mapper))
    }
}

fn push_filter(sql: &mut String, bind_values: &mut Vec<SqlValue>, filter: &Filter) {
    let column = quote_identifier(&filter.column);
    let as_text = format!("CAST({column} AS TEXT)");
    let operand = &filter.operand;
    let empty_needle = operand.as_str().is_some_and(str::is_empty);

    let (clause, operand_binds) = match filter.operator {
        Operator::Equal if operand.is_null() => (format!("{column} IS NULL"), 0),
        Operator::NotEqual if operand.is_null() => (format!("{column} IS NOT NULL"), 0),
        Operator::Equal => (format!("{column} = ?"), 1),
        Operator::NotEqual => (format!("{column} <> ?"), 1),
        Operator::GreaterThan => (format!("{column} > ?"), 1),
        Operator::GreaterOrEqual => (format!("{column} >= ?"), 1),
        Operator::LessThan => (format!("{column} < ?"), 1),
        Operator::LessOrEqual => (format!("{column} <= ?"), 1),
        Operator::Contains | Operator::StartsWith | Operator::EndsWith if empty_needle => {
            (format!("{column} IS NOT NULL"), 0)
        }
        Operator::Contains => (format!("instr({as_text}, ?) > 0"), 1),
        Operator::StartsWith => (format!("substr({as_text}, 1, length(?)) = ?"), 2),
        Operator::EndsWith => (format!("substr({as_text}, -length(?)) = ?"), 2),
        Operator::Matches => (format!("regexp(?, {as_text})"), 1),
        Operator::In => match operand {
            Value::List(items) if !items.is_empty() => {
                bind_values.extend(items.iter().map(to_sql));
                let placeholders = vec!["?"; items.len()].join(", ");
                (format!("{column} IN ({placeholders})"), 0)
            }
            _ => ("0 = 1".to_string(), 0),
        },
    };

    sql.push_str(&clause);
    bind_values.extend(std::iter::repeat_with(|| to_sql(operand)).take(operand_binds));
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null | Value::List(_) => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Integer(number) => SqlValue::Integer(*number),
        Value::Real(number) => SqlValue::Real(*number),
        Value::Text(text) => SqlValue::Text(text.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Integer(number),
        ValueRef::Real(number) => Value::Real(number),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
