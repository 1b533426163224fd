//! Closed set of filter comparison operators.

use crate::error::OrmError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    /// Substring test, case-sensitive.
    Contains,
    StartsWith,
    EndsWith,
    /// Unanchored regular expression search (`regex` crate syntax).
    Matches,
    /// Membership in a list of candidate values.
    In,
}

impl Operator {
    pub const ALL: [Self; 11] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::GreaterOrEqual,
        Self::LessThan,
        Self::LessOrEqual,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Matches,
        Self::In,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterOrEqual => "GREATER_OR_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessOrEqual => "LESS_OR_EQUAL",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::Matches => "MATCHES",
            Self::In => "IN",
        }
    }

    /// Operators that test the text representation of a field.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::Matches
        )
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    /// Accepts constant names (any case) and the usual comparison symbols.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let operator = match normalized.as_str() {
            "EQUAL" | "=" | "==" => Self::Equal,
            "NOT_EQUAL" | "!=" | "<>" => Self::NotEqual,
            "GREATER_THAN" | ">" => Self::GreaterThan,
            "GREATER_OR_EQUAL" | ">=" => Self::GreaterOrEqual,
            "LESS_THAN" | "<" => Self::LessThan,
            "LESS_OR_EQUAL" | "<=" => Self::LessOrEqual,
            "CONTAINS" => Self::Contains,
            "STARTS_WITH" => Self::StartsWith,
            "ENDS_WITH" => Self::EndsWith,
            "MATCHES" => Self::Matches,
            "IN" => Self::In,
            _ => return Err(OrmError::InvalidOperator(value.to_string())),
        };
        Ok(operator)
    }
}

/// Operator as handed to a finder: either already typed or a name that is
/// checked when the query runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorSpec {
    Known(Operator),
    Named(String),
}

impl OperatorSpec {
    pub fn resolve(&self) -> Result<Operator, OrmError> {
        match self {
            Self::Known(operator) => Ok(*operator),
            Self::Named(name) => name.parse(),
        }
    }
}

impl From<Operator> for OperatorSpec {
    fn from(value: Operator) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for OperatorSpec {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for OperatorSpec {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl Display for OperatorSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(operator) => write!(f, "{operator}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
