use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::value::Value;

/// A log message flowing through the rules.
///
/// Fields keep their insertion order. Null values are never stored: adding
/// a null field is a no-op, which keeps `has_field` and `get_field` in sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    fields: IndexMap<String, Value>,
    streams: BTreeSet<String>,
    filter_out: bool,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut message = Message::new();
        for (name, value) in fields {
            message.add_field(name, value);
        }
        message
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            return;
        }
        self.fields.insert(name.into(), value);
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Snapshot of all fields as a map value.
    pub fn to_value(&self) -> Value {
        Value::Map(self.fields.clone())
    }

    pub fn add_stream(&mut self, stream: impl Into<String>) {
        self.streams.insert(stream.into());
    }

    pub fn remove_stream(&mut self, stream: &str) -> bool {
        self.streams.remove(stream)
    }

    pub fn in_stream(&self, stream: &str) -> bool {
        self.streams.contains(stream)
    }

    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(String::as_str)
    }

    /// Marks the message to be dropped once processing finishes.
    pub fn set_filter_out(&mut self, filter_out: bool) {
        self.filter_out = filter_out;
    }

    pub fn filter_out(&self) -> bool {
        self.filter_out
    }
}
