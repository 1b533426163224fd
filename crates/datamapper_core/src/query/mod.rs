//! Query specification and in-process filter evaluation.
//!
//! # Responsibility
//! - Accumulate projection, conditions, ordering and slicing for one finder.
//! - Resolve a query against an entity definition into executable filters.
//!
//! # Invariants
//! - Operators and fields are checked when a query is prepared, i.e. when a
//!   finder executes, never while it is being built.
//! - Conditions are conjoined in declaration order.
//! - Operands are coerced to the declared field type before comparison.
//! - String operators are case-sensitive in every backend.

use crate::definition::{EntityDefinition, FieldDefinition};
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::{Value, NULL};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

mod operator;

pub use operator::{Operator, OperatorSpec};

/// Requested result columns.
///
/// `*`, an empty list and an empty string all mean "whole entity".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSpec {
    #[default]
    All,
    Fields(Vec<String>),
}

impl ColumnSpec {
    /// Parses a comma separated list such as `"id, title"`.
    pub fn parse(spec: &str) -> Self {
        Self::from_names([spec])
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields: Vec<String> = Vec::new();
        for name in names {
            for part in name.as_ref().split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if part == "*" {
                    return Self::All;
                }
                if !fields.iter().any(|existing| existing == part) {
                    fields.push(part.to_string());
                }
            }
        }
        if fields.is_empty() {
            Self::All
        } else {
            Self::Fields(fields)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<&str> for ColumnSpec {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for ColumnSpec {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&[&str]> for ColumnSpec {
    fn from(value: &[&str]) -> Self {
        Self::from_names(value)
    }
}

impl<const N: usize> From<[&str; N]> for ColumnSpec {
    fn from(value: [&str; N]) -> Self {
        Self::from_names(value)
    }
}

impl From<Vec<&str>> for ColumnSpec {
    fn from(value: Vec<&str>) -> Self {
        Self::from_names(value)
    }
}

impl From<Vec<String>> for ColumnSpec {
    fn from(value: Vec<String>) -> Self {
        Self::from_names(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = OrmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(OrmError::InvalidQuery(format!(
                "unsupported order direction `{other}`; expected ASC|DESC"
            ))),
        }
    }
}

/// Direction as given by a caller: a typed value, or a name such as `"desc"`
/// that is parsed when the query is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionSpec {
    Known(Direction),
    Named(String),
}

impl DirectionSpec {
    pub fn resolve(&self) -> OrmResult<Direction> {
        match self {
            Self::Known(direction) => Ok(*direction),
            Self::Named(name) => name.parse(),
        }
    }
}

impl Default for DirectionSpec {
    fn default() -> Self {
        Self::Known(Direction::Asc)
    }
}

impl From<Direction> for DirectionSpec {
    fn from(value: Direction) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for DirectionSpec {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for DirectionSpec {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: DirectionSpec,
}

/// One `(field, operator, value)` filter triple as declared by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: OperatorSpec,
    pub value: Value,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<OperatorSpec>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Validates the operator, field and operand against `definition`.
    pub fn resolve(&self, definition: &EntityDefinition) -> OrmResult<Filter> {
        let operator = self.operator.resolve()?;
        let field = lookup_field(definition, &self.field)?;
        let invalid = |message: String| {
            OrmError::InvalidQuery(format!("{} {operator}: {message}", self.field))
        };

        let operand = if operator.is_textual() {
            self.value
                .to_text()
                .map(Value::Text)
                .ok_or_else(|| invalid(format!("{} is not a text operand", self.value)))?
        } else if operator == Operator::In {
            let candidates = match &self.value {
                Value::List(items) => items.as_slice(),
                scalar => std::slice::from_ref(scalar),
            };
            let coerced = candidates
                .iter()
                .map(|item| field.field_type.coerce(item))
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            Value::List(coerced)
        } else {
            field.field_type.coerce(&self.value).map_err(invalid)?
        };

        let pattern = match (operator, &operand) {
            (Operator::Matches, Value::Text(source)) => Some(
                Regex::new(source).map_err(|err| invalid(format!("invalid pattern: {err}")))?,
            ),
            _ => None,
        };

        Ok(Filter {
            field: field.name.clone(),
            column: field.column_name().to_string(),
            operator,
            operand,
            pattern,
        })
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// A resolved condition, bound to a storage column.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub column: String,
    pub operator: Operator,
    /// Coerced to the field type; text for string operators, a list for `IN`.
    pub operand: Value,
    pattern: Option<Regex>,
}

impl Filter {
    /// Evaluates this filter against a column-keyed row.
    ///
    /// A `NULL` field value only satisfies `EQUAL NULL`.
    pub fn matches(&self, row: &Record) -> bool {
        let candidate = row.get(&self.column).unwrap_or(&NULL);
        let ordering = || candidate.compare(&self.operand);

        match self.operator {
            Operator::Equal if self.operand.is_null() => candidate.is_null(),
            Operator::Equal => candidate.matches(&self.operand),
            Operator::NotEqual if self.operand.is_null() => !candidate.is_null(),
            Operator::NotEqual => !candidate.is_null() && !candidate.matches(&self.operand),
            Operator::GreaterThan => ordering() == Some(Ordering::Greater),
            Operator::GreaterOrEqual => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            Operator::LessThan => ordering() == Some(Ordering::Less),
            Operator::LessOrEqual => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Operator::Contains => self.text_test(candidate, |text, needle| text.contains(needle)),
            Operator::StartsWith => {
                self.text_test(candidate, |text, needle| text.starts_with(needle))
            }
            Operator::EndsWith => self.text_test(candidate, |text, needle| text.ends_with(needle)),
            Operator::Matches => match (&self.pattern, candidate.to_text()) {
                (Some(pattern), Some(text)) => pattern.is_match(&text),
                _ => false,
            },
            Operator::In => match &self.operand {
                Value::List(items) => items.iter().any(|item| candidate.matches(item)),
                _ => false,
            },
        }
    }

    fn text_test(&self, candidate: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
        match (candidate.to_text(), self.operand.as_str()) {
            (Some(text), Some(needle)) => test(&text, needle),
            _ => false,
        }
    }
}

/// Accumulated, not yet executed query for one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: ColumnSpec,
    pub conditions: Vec<Condition>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Human-readable conjunction of the conditions, for diagnostics.
    pub fn describe_conditions(&self) -> String {
        if self.conditions.is_empty() {
            return "no conditions".to_string();
        }
        self.conditions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Resolves the query against `definition`.
    ///
    /// Fails with `InvalidOperator`, `UnknownField` or `InvalidQuery`.
    pub fn prepare(&self, definition: &EntityDefinition) -> OrmResult<PreparedQuery> {
        let filters = self
            .conditions
            .iter()
            .map(|condition| condition.resolve(definition))
            .collect::<OrmResult<Vec<_>>>()?;

        let projection = match &self.columns {
            ColumnSpec::All => None,
            ColumnSpec::Fields(names) => Some(
                names
                    .iter()
                    .map(|name| lookup_field(definition, name).cloned())
                    .collect::<OrmResult<Vec<_>>>()?,
            ),
        };

        let order = match &self.order {
            Some(order) => Some(PreparedOrder {
                column: lookup_field(definition, &order.field)?
                    .column_name()
                    .to_string(),
                direction: order.direction.resolve()?,
            }),
            None => None,
        };

        Ok(PreparedQuery {
            entity: definition.name.clone(),
            table: definition.table.clone(),
            filters,
            projection,
            order,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOrder {
    pub column: String,
    pub direction: Direction,
}

/// Query resolved against a definition, ready for a data mapper.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub entity: String,
    pub table: String,
    pub filters: Vec<Filter>,
    /// `None` when whole entities are requested.
    pub projection: Option<Vec<FieldDefinition>>,
    pub order: Option<PreparedOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PreparedQuery {
    pub fn accepts(&self, row: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Filters, orders (stable, ties keep input order) and slices `rows`.
    pub fn evaluate<'r>(&self, rows: impl IntoIterator<Item = &'r Record>) -> Vec<Record> {
        let mut matched: Vec<&Record> = rows.into_iter().filter(|row| self.accepts(row)).collect();

        if let Some(order) = &self.order {
            matched.sort_by(|left, right| {
                let left = left.get(&order.column).unwrap_or(&NULL);
                let right = right.get(&order.column).unwrap_or(&NULL);
                match order.direction {
                    Direction::Asc => left.sort_cmp(right),
                    Direction::Desc => right.sort_cmp(left),
                }
            });
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

fn lookup_field<'d>(definition: &'d EntityDefinition, name: &str) -> OrmResult<&'d FieldDefinition> {
    definition.field(name).ok_or_else(|| OrmError::UnknownField {
        entity: definition.name.clone(),
        field: name.to_string(),
    })
}
