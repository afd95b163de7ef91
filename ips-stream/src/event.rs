use serde_json::{Map, Value};

/// Where a completed value sits inside its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// The document root.
    Root,
    Field(String),
    Index(usize),
}

impl Key {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Field(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_field(&self, name: &str) -> bool {
        self.as_field() == Some(name)
    }
}

/// The partially built container a completed value belongs to.
///
/// Only siblings that completed earlier (and were retained) are visible.
#[derive(Debug, Clone, Copy)]
pub enum Parent<'a> {
    Root,
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
}

impl<'a> Parent<'a> {
    pub fn as_object(&self) -> Option<&'a Map<String, Value>> {
        match self {
            Parent::Object(map) => Some(map),
            _ => None,
        }
    }

    /// String sibling field of an object parent.
    pub fn field_str(&self, name: &str) -> Option<&'a str> {
        self.as_object()?.get(name)?.as_str()
    }
}

/// A JSON value that just completed, at any depth.
#[derive(Debug)]
pub struct ValueEvent<'a> {
    /// Keys from the root down to the parent container, excluding the root itself.
    pub path: &'a [Key],
    pub key: &'a Key,
    pub parent: Parent<'a>,
    pub value: Value,
}

impl ValueEvent<'_> {
    /// Nesting depth of the value; the root is depth 0.
    pub fn depth(&self) -> usize {
        match self.parent {
            Parent::Root => 0,
            _ => self.path.len() + 1,
        }
    }
}

/// Receives value events in stream order.
///
/// The sink takes ownership of every completed value. Returning `Some` hands it back to be attached
/// to its parent; returning `None` drops it from the tree under construction, which is how callers
/// keep memory bounded.
pub trait ValueSink {
    fn on_value(&mut self, event: ValueEvent<'_>) -> Option<Value>;
}

impl<F> ValueSink for F
where
    F: FnMut(ValueEvent<'_>) -> Option<Value>,
{
    fn on_value(&mut self, event: ValueEvent<'_>) -> Option<Value> {
        self(event)
    }
}
