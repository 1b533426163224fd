//! Dynamic field values exchanged between finders, mappers and entities.
//!
//! # Invariants
//! - `Integer`, `Real` and `Bool` compare numerically with each other.
//! - `Text` compares lexically (Unicode scalar order, case-sensitive).
//! - `Null` never compares with anything; in sort order it comes first.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Candidate set for `IN` filters. Never stored in a field.
    List(Vec<Value>),
}

/// Shared `Null` for lookups that fall back to "no value".
pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for values that do not count as a set identity:
    /// null, zero, `false`, blank or `"0"` text and empty lists.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(value) => !value,
            Self::Integer(value) => *value == 0,
            Self::Real(value) => *value == 0.0,
            Self::Text(value) => value.trim().is_empty() || value == "0",
            Self::List(values) => values.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Text representation used by the string operators.
    ///
    /// Booleans render as `1`/`0` and reals as SQLite's `CAST(x AS TEXT)`
    /// does (`2.0`, `0.1`, `1.0e+20`), so both backends test the same text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::List(_) => None,
            Self::Bool(value) => Some(if *value { "1" } else { "0" }.to_string()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Real(value) => Some(real_text(*value)),
            Self::Text(value) => Some(value.clone()),
        }
    }

    /// Partial comparison used by filter evaluation.
    ///
    /// Numbers compare with numbers, text with text. Numeric text compares
    /// numerically against numbers; everything else is incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::List(_), _) | (_, Self::List(_)) => None,
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Text(left), Self::Text(right)) => Some(left.cmp(right)),
            (Self::Text(text), number) => {
                let parsed = text.trim().parse::<f64>().ok()?;
                parsed.partial_cmp(&number.as_f64()?)
            }
            (number, Self::Text(text)) => {
                let parsed = text.trim().parse::<f64>().ok()?;
                number.as_f64()?.partial_cmp(&parsed)
            }
            (left, right) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        }
    }

    /// Equality under comparison semantics (`1 == 1.0 == true`).
    pub fn matches(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Total order used for sorting result sets.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => self.compare(other).unwrap_or(Ordering::Equal),
            unequal => unequal,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) | Self::Integer(_) | Self::Real(_) => 1,
            Self::Text(_) => 2,
            Self::List(_) => 3,
        }
    }
}

/// SQLite's `%!.15g`: 15 significant digits, at least one fractional digit,
/// exponent form outside `1e-4..1e15`.
fn real_text(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if (-4..15).contains(&exponent) {
        let decimals = usize::try_from(14 - exponent).unwrap_or(0);
        return trim_fraction(&format!("{value:.decimals$}"));
    }

    let scientific = format!("{value:.14e}");
    let (mantissa, power) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let power: i32 = power.parse().unwrap_or(0);
    let sign = if power < 0 { '-' } else { '+' };
    format!("{}e{sign}{:02}", trim_fraction(mantissa), power.abs())
}

fn trim_fraction(digits: &str) -> String {
    if !digits.contains('.') {
        return format!("{digits}.0");
    }
    let trimmed = digits.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{value}'"),
            Self::List(values) => {
                write!(f, "[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(values: [T; N]) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}
