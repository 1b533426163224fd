//! Typed entity instances.
//!
//! # Invariants
//! - The field set is fixed by the entity definition; unknown fields are rejected.
//! - A blank identity (see `Value::is_blank`) marks a not-yet-persisted entity.
//! - Relations are lazy handles, never pre-loaded data.

use crate::definition::RelationKind;
use crate::error::{OrmError, OrmResult};
use crate::value::{Value, NULL};
use std::collections::BTreeMap;

/// Lazily bound association to records of another (or the same) entity.
///
/// `scope` holds the equality conditions that select the related records
/// on the target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationHandle {
    pub name: String,
    pub kind: RelationKind,
    pub entity: String,
    pub scope: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    identity: String,
    fields: BTreeMap<String, Value>,
    relations: BTreeMap<String, RelationHandle>,
}

impl Entity {
    pub(crate) fn new(
        name: impl Into<String>,
        identity: impl Into<String>,
        fields: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
            fields,
            relations: BTreeMap::new(),
        }
    }

    /// Entity type name, e.g. `Article`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &Value {
        self.fields.get(&self.identity).unwrap_or(&NULL)
    }

    pub fn has_identity(&self) -> bool {
        !self.id().is_blank()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a declared field.
    ///
    /// Type conformance is checked when the entity is written, so a value of
    /// the wrong type fails at `add`, not here.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> OrmResult<()> {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(OrmError::UnknownField {
                entity: self.name.clone(),
                field: field.to_string(),
            }),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Handle attached at the last build or add.
    ///
    /// `Repository::relation` recomputes it from the current field values.
    pub fn relation(&self, name: &str) -> Option<&RelationHandle> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationHandle> {
        self.relations.values()
    }

    pub(crate) fn set_relation(&mut self, handle: RelationHandle) {
        self.relations.insert(handle.name.clone(), handle);
    }
}

#[cfg(test)]
mod tests {
    use super::Entity;
    use crate::error::OrmError;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn article() -> Entity {
        let fields = BTreeMap::from([
            ("id".to_string(), Value::Null),
            ("title".to_string(), Value::Null),
        ]);
        Entity::new("Article", "id", fields)
    }

    #[test]
    fn new_entity_has_no_identity_until_assigned() {
        let mut entity = article();
        assert!(!entity.has_identity());
        entity.set("id", 9).unwrap();
        assert!(entity.has_identity());
        assert_eq!(entity.id(), &Value::Integer(9));
    }

    #[test]
    fn set_rejects_undeclared_fields() {
        let mut entity = article();
        entity.set("title", "Hello").unwrap();
        assert_eq!(entity.get("title"), Some(&Value::from("Hello")));

        let err = entity.set("subtitle", "nope").unwrap_err();
        assert!(matches!(err, OrmError::UnknownField { field, .. } if field == "subtitle"));
    }
}
