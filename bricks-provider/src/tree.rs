//! Configuration tree model.
//!
//! A [`ConfigTree`] is the declared description of one resource: an ordered
//! mapping from field name to [`Value`]. Singleton nested blocks are stored as
//! a list holding at most one [`Value::Block`].
//!
//! The transcoder never touches a concrete representation directly. It reads
//! and writes through [`ConfigSource`], which is implemented for
//! [`ConfigTree`] and for raw JSON objects (`serde_json::Map`) as handed over
//! by a front end.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    /// Unordered string mapping (tags, env vars, conf).
    Map(BTreeMap<String, String>),
    /// Ordered list; order is significant.
    List(Vec<Value>),
    /// Nested sub-tree.
    Block(ConfigTree),
    /// A `null` list element. Readers reject it.
    Null,
}

impl Value {
    /// Whether this is the zero value of its type. Zero means "unset".
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::String(s) => s.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Block(t) => t.is_empty(),
            Value::Null => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::String(_) => "string",
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::Block(_) => "block",
            Value::Null => "null",
        }
    }

    /// View a value as a string mapping. A block whose entries are all
    /// strings qualifies too, since JSON cannot tell the two apart.
    pub fn as_string_map(&self) -> Option<BTreeMap<String, String>> {
        match self {
            Value::Map(m) => Some(m.clone()),
            Value::Block(t) => t
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Some((k.clone(), s.clone())),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// View a value as a nested block.
    pub fn as_block(&self) -> Option<ConfigTree> {
        match self {
            Value::Block(t) => Some(t.clone()),
            Value::Map(m) => Some(ConfigTree(
                m.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Convert from JSON. A `null` field yields `None`, since it means unset;
    /// a `null` list element becomes [`Value::Null`] so its position is kept.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            }),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                Some(Value::List(
                    items
                        .iter()
                        .map(|item| Value::from_json(item).unwrap_or(Value::Null))
                        .collect(),
                ))
            }
            serde_json::Value::Object(obj) => {
                let all_strings: Option<BTreeMap<String, String>> = obj
                    .iter()
                    .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect();
                match all_strings {
                    Some(map) => Some(Value::Map(map)),
                    None => Some(Value::Block(ConfigTree::from_json_object(obj))),
                }
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::String(s) => serde_json::Value::String(s),
            Value::Map(m) => serde_json::Value::Object(
                m.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Block(t) => serde_json::Value::Object(t.into_json_object()),
            Value::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ConfigTree> for Value {
    fn from(t: ConfigTree) -> Self {
        Value::Block(t)
    }
}

/// Ordered field-name to value mapping describing one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigTree(BTreeMap<String, Value>);

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style insert of a singleton block.
    pub fn with_block(self, key: &str, block: ConfigTree) -> Self {
        self.with(key, Value::List(vec![Value::Block(block)]))
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the tree with zero-valued entries removed, recursively.
    ///
    /// Blocks inside lists are kept even when they prune to empty, so list
    /// length (and therefore block presence) survives.
    pub fn pruned(&self) -> ConfigTree {
        ConfigTree(
            self.0
                .iter()
                .filter_map(|(k, v)| prune_value(v).map(|v| (k.clone(), v)))
                .collect(),
        )
    }

    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        ConfigTree(
            obj.iter()
                .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                .collect(),
        )
    }

    pub fn into_json_object(self) -> serde_json::Map<String, serde_json::Value> {
        self.0.into_iter().map(|(k, v)| (k, v.into())).collect()
    }

    /// JSON rendering, in which string maps and all-string blocks coincide.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.clone().into_json_object())
    }

    /// Equality under the "zero means unset" convention.
    pub fn equivalent(&self, other: &ConfigTree) -> bool {
        self.pruned().to_json() == other.pruned().to_json()
    }
}

fn prune_value(value: &Value) -> Option<Value> {
    match value {
        Value::List(items) if !items.is_empty() => Some(Value::List(
            items
                .iter()
                .map(|item| match item.as_block() {
                    Some(t) => Value::Block(t.pruned()),
                    None => item.clone(),
                })
                .collect(),
        )),
        Value::Block(t) => {
            let t = t.pruned();
            (!t.is_empty()).then_some(Value::Block(t))
        }
        other if other.is_zero() => None,
        other => Some(other.clone()),
    }
}

impl<'de> Deserialize<'de> for ConfigTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(ConfigTree::from_json_object(&obj))
    }
}

/// Uniform field access over a configuration representation.
pub trait ConfigSource {
    /// Value stored under `key`, zero values included.
    fn get(&self, key: &str) -> Option<Value>;

    /// Value stored under `key`, unless absent or zero.
    fn get_if_present(&self, key: &str) -> Option<Value> {
        self.get(key).filter(|v| !v.is_zero())
    }

    fn set(&mut self, key: &str, value: Value);
}

impl ConfigSource for ConfigTree {
    fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.insert(key, value);
    }
}

impl ConfigSource for serde_json::Map<String, serde_json::Value> {
    fn get(&self, key: &str) -> Option<Value> {
        serde_json::Map::get(self, key).and_then(Value::from_json)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.insert(key.to_string(), value.into());
    }
}
