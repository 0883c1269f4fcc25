//! Attribute values, attribute maps, and resolved person records.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single opaque attribute value.
///
/// Deserialized untagged, so TOML and JSON scalars map directly onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Borrow the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        AttributeValue::Float(x)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Attribute name -> ordered values. A present key always holds a (possibly
/// empty) sequence; an absent key means "unknown".
pub type AttributeMap = HashMap<String, Vec<AttributeValue>>;

/// Build an [`AttributeMap`] from `(name, values)` pairs.
///
/// ```
/// use persondir_core::attributes::attribute_map;
///
/// let map = attribute_map([("phone", vec!["777-7777"])]);
/// assert_eq!(map["phone"].len(), 1);
/// ```
pub fn attribute_map<K, V, I, L>(pairs: I) -> AttributeMap
where
    K: Into<String>,
    V: Into<AttributeValue>,
    L: IntoIterator<Item = V>,
    I: IntoIterator<Item = (K, L)>,
{
    pairs
        .into_iter()
        .map(|(k, vs)| (k.into(), vs.into_iter().map(Into::into).collect()))
        .collect()
}

/// First value recorded for `name`, if any.
pub fn first_value<'a>(map: &'a AttributeMap, name: &str) -> Option<&'a AttributeValue> {
    map.get(name).and_then(|values| values.first())
}

/// An immutable snapshot of a resolved person: a primary name plus the
/// attributes that were resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonAttributes {
    name: String,
    attributes: AttributeMap,
}

impl PersonAttributes {
    /// Create a record, inserting `name` under `name_attribute` when the map
    /// does not already carry that attribute.
    pub fn new(name: impl Into<String>, name_attribute: &str, mut attributes: AttributeMap) -> Self {
        let name = name.into();
        let slot = attributes.entry(name_attribute.to_string()).or_default();
        if slot.is_empty() {
            slot.push(AttributeValue::String(name.clone()));
        }
        Self { name, attributes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// All values of one attribute.
    pub fn values(&self, attribute: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }

    /// First value of one attribute.
    pub fn value(&self, attribute: &str) -> Option<&AttributeValue> {
        first_value(&self.attributes, attribute)
    }

    pub fn into_attributes(self) -> AttributeMap {
        self.attributes
    }
}
