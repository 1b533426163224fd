//! Entity definitions: static storage metadata per entity type.
//!
//! # Responsibility
//! - Describe field-to-column mappings, field types and relations.
//! - Load definitions through pluggable locator strategies.
//! - Cache loaded definitions in an immutable registry.
//!
//! # Invariants
//! - Every table, column and field name matches `[A-Za-z_][A-Za-z0-9_]*`.
//! - Every definition declares an integer identity field.
//! - A registry is fully populated before any repository uses it.

use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod config;
mod locator;
mod registry;

pub use config::{EntityConfig, EntitySection};
pub use locator::{Locator, LocatorStrategy, MapStrategy, RecursiveDirectoryStrategy};
pub use registry::DefinitionRegistry;

static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern must compile")
});

/// Returns whether `value` is safe to use as a table, column or field name.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_PATTERN.is_match(value)
}

#[derive(Debug)]
pub enum DefinitionError {
    /// No locator strategy knows a definition for this entity.
    NotFound(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid {
        entity: String,
        message: String,
    },
}

impl DefinitionError {
    fn invalid(entity: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "no definition found for entity `{name}`"),
            Self::Io { path, source } => {
                write!(f, "cannot read definition `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "cannot parse definition `{}`: {source}", path.display())
            }
            Self::Invalid { entity, message } => {
                write!(f, "invalid definition for `{entity}`: {message}")
            }
        }
    }
}

impl Error for DefinitionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::NotFound(_) | Self::Invalid { .. } => None,
        }
    }
}

/// Declared storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl FieldType {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// Converts `value` into this type's canonical variant.
    ///
    /// `Null` passes through unchanged. Lists are never coercible.
    pub fn coerce(self, value: &Value) -> Result<Value, String> {
        let incompatible = || format!("{value} is not a valid {}", self.label());
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (_, Value::List(_)) => Err(incompatible()),
            (Self::Integer, Value::Integer(_)) => Ok(value.clone()),
            (Self::Integer, Value::Bool(flag)) => Ok(Value::Integer(i64::from(*flag))),
            (Self::Integer, Value::Real(number)) if number.fract() == 0.0 => {
                Ok(Value::Integer(*number as i64))
            }
            (Self::Integer, Value::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| incompatible()),
            (Self::Integer, Value::Real(_)) => Err(incompatible()),
            (Self::Real, Value::Text(text)) => text
                .trim()
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| incompatible()),
            (Self::Real, other) => other.as_f64().map(Value::Real).ok_or_else(incompatible),
            (Self::Text, Value::Text(_)) => Ok(value.clone()),
            (Self::Text, other) => other.to_text().map(Value::Text).ok_or_else(incompatible),
            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Boolean, Value::Integer(number)) => Ok(Value::Bool(*number != 0)),
            (Self::Boolean, Value::Real(number)) => Ok(Value::Bool(*number != 0.0)),
            (Self::Boolean, Value::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(Value::Bool(true)),
                "0" | "false" | "" => Ok(Value::Bool(false)),
                _ => Err(incompatible()),
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Storage column; defaults to the field name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Back-filled by the entity builder when the field is unset.
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldDefinition {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Target records reference this entity's identity.
    HasMany,
    /// Like `HasMany`, for at most one target record.
    HasOne,
    /// This entity's `reference` field holds the target identity.
    BelongsTo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationDefinition {
    pub name: String,
    pub kind: RelationKind,
    /// Target entity name.
    pub entity: String,
    /// Foreign key field (on the target for `has_*`, on this entity for `belongs_to`).
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Storage table; derived from the name when empty.
    #[serde(default)]
    pub table: String,
    #[serde(default = "default_identity")]
    pub identity: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

fn default_identity() -> String {
    "id".to_string()
}

impl EntityDefinition {
    /// Parses a JSON definition document.
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        let mut definition: Self = serde_json::from_str(source)?;
        if definition.table.trim().is_empty() {
            definition.table = format!("{}s", definition.name.to_ascii_lowercase());
        }
        Ok(definition)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn identity_field(&self) -> Option<&FieldDefinition> {
        self.field(&self.identity)
    }

    /// Column holding the identity; falls back to the identity name.
    pub fn identity_column(&self) -> &str {
        self.identity_field()
            .map_or(self.identity.as_str(), FieldDefinition::column_name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Checks self-contained invariants; cross-entity checks live in the registry.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let name = self.name.as_str();
        if !is_valid_identifier(name) {
            return Err(DefinitionError::invalid(name, "entity name is not an identifier"));
        }
        if !is_valid_identifier(&self.table) {
            return Err(DefinitionError::invalid(
                name,
                format!("table `{}` is not an identifier", self.table),
            ));
        }

        let mut seen_fields = Vec::with_capacity(self.fields.len());
        let mut seen_columns = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !is_valid_identifier(&field.name) || !is_valid_identifier(field.column_name()) {
                return Err(DefinitionError::invalid(
                    name,
                    format!("field `{}` has an invalid name or column", field.name),
                ));
            }
            if seen_fields.contains(&field.name.as_str())
                || seen_columns.contains(&field.column_name())
            {
                return Err(DefinitionError::invalid(
                    name,
                    format!("field `{}` is declared twice", field.name),
                ));
            }
            if let Some(default) = &field.default {
                field.field_type.coerce(default).map_err(|message| {
                    DefinitionError::invalid(
                        name,
                        format!("default of `{}`: {message}", field.name),
                    )
                })?;
            }
            seen_fields.push(field.name.as_str());
            seen_columns.push(field.column_name());
        }

        match self.identity_field() {
            Some(field) if field.field_type == FieldType::Integer => {}
            Some(_) => {
                return Err(DefinitionError::invalid(
                    name,
                    format!("identity `{}` must be an integer field", self.identity),
                ));
            }
            None => {
                return Err(DefinitionError::invalid(
                    name,
                    format!("identity `{}` is not a declared field", self.identity),
                ));
            }
        }

        for relation in &self.relations {
            if !is_valid_identifier(&relation.name) {
                return Err(DefinitionError::invalid(
                    name,
                    format!("relation `{}` is not an identifier", relation.name),
                ));
            }
            if self.field(&relation.name).is_some() {
                return Err(DefinitionError::invalid(
                    name,
                    format!("relation `{}` shadows a field", relation.name),
                ));
            }
            if relation.kind == RelationKind::BelongsTo && self.field(&relation.reference).is_none()
            {
                return Err(DefinitionError::invalid(
                    name,
                    format!(
                        "relation `{}` references unknown field `{}`",
                        relation.name, relation.reference
                    ),
                ));
            }
        }

        Ok(())
    }
}
