//! Presentation wrappers around tree values
//!
//! A descriptor renders and edits one value without knowing which backend it
//! came from. [`DatabaseNodeDescriptorFactory`] picks the descriptor kind.

use crate::element::{DatabaseElement, DatabasePrimitive, ObjectValue};
use crate::types::SearchResult;
use serde::Serialize;
use std::fmt;

/// Icon selector of a typed (non-primitive) descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeIcon {
    Object,
    Array,
    /// Fallback values, keyed by their backend type name
    Other(String),
}

/// Descriptor variant chosen for a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Boolean,
    Number,
    Date,
    String,
    /// Any other primitive (null)
    Default,
    /// Records, arrays and unrecognised native values
    Typed(TypeIcon),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Default => write!(f, "default"),
            ValueKind::Typed(TypeIcon::Object) => write!(f, "object"),
            ValueKind::Typed(TypeIcon::Array) => write!(f, "array"),
            ValueKind::Typed(TypeIcon::Other(name)) => write!(f, "{}", name),
        }
    }
}

/// Pick the descriptor kind for a value.
///
/// Primitives dispatch Boolean, Number, Date, String, then the default
/// renderer. Everything else gets a typed descriptor keyed by its type.
pub fn value_kind(value: &DatabaseElement) -> ValueKind {
    match value {
        DatabaseElement::Primitive(primitive) => match primitive {
            DatabasePrimitive::Boolean(_) => ValueKind::Boolean,
            DatabasePrimitive::Number(_) => ValueKind::Number,
            DatabasePrimitive::Date(_) => ValueKind::Date,
            DatabasePrimitive::String(_) => ValueKind::String,
            DatabasePrimitive::Null => ValueKind::Default,
        },
        DatabaseElement::Object(ObjectValue::Record(_)) => ValueKind::Typed(TypeIcon::Object),
        DatabaseElement::Object(ObjectValue::Opaque(opaque)) => {
            ValueKind::Typed(TypeIcon::Other(opaque.type_name.clone()))
        }
        DatabaseElement::Array(_) => ValueKind::Typed(TypeIcon::Array),
    }
}

fn format_value(value: &DatabaseElement) -> String {
    match value {
        DatabaseElement::Primitive(DatabasePrimitive::String(s)) => format!("\"{}\"", s),
        DatabaseElement::Primitive(primitive) => primitive.to_string(),
        DatabaseElement::Object(ObjectValue::Opaque(opaque)) => opaque.text.clone(),
        composite => composite.to_json().to_string(),
    }
}

/// What every tree node exposes to a renderer
pub trait Descriptor {
    fn formatted_key(&self) -> String;

    fn formatted_value(&self) -> String;

    fn value(&self) -> Option<&DatabaseElement>;

    fn set_value(&mut self, value: DatabaseElement);
}

/// Root of a result tree
#[derive(Debug, Clone)]
pub struct ResultDescriptor {
    name: String,
}

impl ResultDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Descriptor for ResultDescriptor {
    fn formatted_key(&self) -> String {
        format!("results of '{}'", self.name)
    }

    fn formatted_value(&self) -> String {
        String::new()
    }

    fn value(&self) -> Option<&DatabaseElement> {
        None
    }

    // The root carries no value
    fn set_value(&mut self, _value: DatabaseElement) {}
}

/// A named field of a record
#[derive(Debug, Clone)]
pub struct KeyValueDescriptor {
    key: String,
    value: DatabaseElement,
    kind: ValueKind,
}

impl KeyValueDescriptor {
    pub fn new(key: impl Into<String>, value: DatabaseElement) -> Self {
        let kind = value_kind(&value);
        Self {
            key: key.into(),
            value,
            kind,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

impl Descriptor for KeyValueDescriptor {
    fn formatted_key(&self) -> String {
        self.key.clone()
    }

    fn formatted_value(&self) -> String {
        format_value(&self.value)
    }

    fn value(&self) -> Option<&DatabaseElement> {
        Some(&self.value)
    }

    fn set_value(&mut self, value: DatabaseElement) {
        self.kind = value_kind(&value);
        self.value = value;
    }
}

/// An element of an array
#[derive(Debug, Clone)]
pub struct IndexedValueDescriptor {
    index: usize,
    value: DatabaseElement,
    kind: ValueKind,
}

impl IndexedValueDescriptor {
    pub fn new(index: usize, value: DatabaseElement) -> Self {
        let kind = value_kind(&value);
        Self { index, value, kind }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

impl Descriptor for IndexedValueDescriptor {
    fn formatted_key(&self) -> String {
        format!("[{}]", self.index)
    }

    fn formatted_value(&self) -> String {
        format_value(&self.value)
    }

    fn value(&self) -> Option<&DatabaseElement> {
        Some(&self.value)
    }

    fn set_value(&mut self, value: DatabaseElement) {
        self.kind = value_kind(&value);
        self.value = value;
    }
}

/// Descriptor held by a tree node
#[derive(Debug, Clone)]
pub enum NodeDescriptor {
    Result(ResultDescriptor),
    KeyValue(KeyValueDescriptor),
    IndexedValue(IndexedValueDescriptor),
}

impl NodeDescriptor {
    /// Value kind, `None` for the result root
    pub fn kind(&self) -> Option<&ValueKind> {
        match self {
            NodeDescriptor::Result(_) => None,
            NodeDescriptor::KeyValue(d) => Some(d.kind()),
            NodeDescriptor::IndexedValue(d) => Some(d.kind()),
        }
    }

    fn inner(&self) -> &dyn Descriptor {
        match self {
            NodeDescriptor::Result(d) => d,
            NodeDescriptor::KeyValue(d) => d,
            NodeDescriptor::IndexedValue(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Descriptor {
        match self {
            NodeDescriptor::Result(d) => d,
            NodeDescriptor::KeyValue(d) => d,
            NodeDescriptor::IndexedValue(d) => d,
        }
    }
}

impl Descriptor for NodeDescriptor {
    fn formatted_key(&self) -> String {
        self.inner().formatted_key()
    }

    fn formatted_value(&self) -> String {
        self.inner().formatted_value()
    }

    fn value(&self) -> Option<&DatabaseElement> {
        self.inner().value()
    }

    fn set_value(&mut self, value: DatabaseElement) {
        self.inner_mut().set_value(value)
    }
}

/// Creates the descriptor of every node while a tree is built
pub trait NodeDescriptorFactory: Send + Sync {
    fn create_result_descriptor(&self, result: &SearchResult) -> NodeDescriptor;

    fn create_key_value_descriptor(&self, key: &str, value: DatabaseElement) -> NodeDescriptor;

    fn create_index_value_descriptor(&self, index: usize, value: DatabaseElement)
        -> NodeDescriptor;
}

/// Factory used by every backend
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseNodeDescriptorFactory;

impl NodeDescriptorFactory for DatabaseNodeDescriptorFactory {
    fn create_result_descriptor(&self, result: &SearchResult) -> NodeDescriptor {
        NodeDescriptor::Result(ResultDescriptor::new(result.name()))
    }

    fn create_key_value_descriptor(&self, key: &str, value: DatabaseElement) -> NodeDescriptor {
        NodeDescriptor::KeyValue(KeyValueDescriptor::new(key, value))
    }

    fn create_index_value_descriptor(
        &self,
        index: usize,
        value: DatabaseElement,
    ) -> NodeDescriptor {
        NodeDescriptor::IndexedValue(IndexedValueDescriptor::new(index, value))
    }
}
