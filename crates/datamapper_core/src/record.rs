//! Ordered key/value rows.
//!
//! A `Record` is the wire format between a data mapper and its storage
//! (keyed by column) and the result shape of projected queries (keyed by
//! field, in the requested order).

use crate::value::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::value::Value;

    #[test]
    fn insert_preserves_first_position_and_overwrites_value() {
        let mut record = Record::new();
        record.insert("id", 1);
        record.insert("title", "draft");
        record.insert("id", 2);

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "title"]);
        assert_eq!(record.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn equality_is_order_sensitive() {
        let left: Record = [("id", Value::from(1)), ("title", Value::from("a"))]
            .into_iter()
            .collect();
        let right: Record = [("title", Value::from("a")), ("id", Value::from(1))]
            .into_iter()
            .collect();
        assert_ne!(left, right);
    }

    #[test]
    fn serializes_as_ordered_json_object() {
        let record: Record = [("title", Value::from("x")), ("id", Value::from(3))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"title":"x","id":3}"#
        );
    }
}
