//! Per-model storage of coerced field values

use serde_json::{Map, Value};

use crate::value::FieldValue;

/// Coerced values keyed by field name, kept in declaration order
///
/// Only fields that resolved to a present value are stored; an unset optional
/// field has no entry at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage {
    entries: Vec<(usize, String, FieldValue)>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for the field declared at `position`, replacing any
    /// previous value
    pub(crate) fn insert(&mut self, position: usize, key: &str, value: FieldValue) {
        match self.entries.binary_search_by_key(&position, |(p, _, _)| *p) {
            Ok(index) => self.entries[index].2 = value,
            Err(index) => self.entries.insert(index, (position, key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(_, k, _)| k == key)
            .map(|(_, _, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(_, k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain mapping of the stored values; nested objects are serialized
    /// through their own mapping
    pub fn to_mapping(&self) -> Map<String, Value> {
        self.iter()
            .map(|(key, value)| (key.to_string(), value.to_value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_keeps_declaration_order() {
        let mut storage = Storage::new();
        storage.insert(2, "c", FieldValue::Int(3));
        storage.insert(0, "a", FieldValue::Int(1));
        storage.insert(1, "b", FieldValue::Bool(false));

        assert_eq!(storage.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        let text = Value::Object(storage.to_mapping()).to_string();
        assert_eq!(text, r#"{"a":1,"b":false,"c":3}"#);
    }

    #[test]
    fn test_insert_replaces() {
        let mut storage = Storage::new();
        storage.insert(0, "a", FieldValue::String("x".to_string()));
        storage.insert(0, "a", FieldValue::String("y".to_string()));

        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("a").and_then(FieldValue::as_str), Some("y"));
        assert_eq!(storage.to_mapping().get("a"), Some(&json!("y")));
    }
}
