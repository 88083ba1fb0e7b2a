//! Serializable plugin state.
//!
//! Plugins hand their configuration to the host as a `StateValue` tree so
//! that snapshots can be written with a structured encoding.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tagged value built from scalars, lists, string sets and string-keyed maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Text(String),
    List(Vec<StateValue>),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, StateValue>),
}

impl StateValue {
    pub fn map() -> Self {
        StateValue::Map(BTreeMap::new())
    }

    /// Builder-style insert; no-op unless `self` is a map.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        if let StateValue::Map(ref mut m) = self {
            m.insert(key.into(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        match self {
            StateValue::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StateValue>> {
        match self {
            StateValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            StateValue::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StateValue::Null => "null",
            StateValue::Bool(_) => "bool",
            StateValue::Int(_) => "int",
            StateValue::Float(_) => "float",
            StateValue::Text(_) => "text",
            StateValue::List(_) => "list",
            StateValue::Set(_) => "set",
            StateValue::Map(_) => "map",
        }
    }
}

/// Floats are written as JSON numbers, except NaN and the infinities which
/// JSON cannot hold; those are written as the strings `NaN`, `inf`, `-inf`.
mod float_repr {
    use serde::de::{self, Deserializer};
    use serde::Deserialize;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("not a float: {:?}", other))),
            },
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Text(s)
    }
}

impl From<i64> for StateValue {
    fn from(i: i64) -> Self {
        StateValue::Int(i)
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<BTreeSet<String>> for StateValue {
    fn from(s: BTreeSet<String>) -> Self {
        StateValue::Set(s)
    }
}

impl From<BTreeMap<String, StateValue>> for StateValue {
    fn from(m: BTreeMap<String, StateValue>) -> Self {
        StateValue::Map(m)
    }
}
