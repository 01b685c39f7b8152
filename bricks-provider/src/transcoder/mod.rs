//! Schema transcoder: configuration tree <-> wire settings.
//!
//! `expand_*` walks a [`ConfigSource`] and builds the wire request;
//! `flatten_*` is its inverse and writes every schema key, using empty
//! values (and empty lists for absent blocks) where the wire side has
//! nothing. Remote-computed fields are never written back.
//!
//! Round trip: for any tree that passes validation,
//! `flatten(expand(tree))` is equivalent to `tree` (see
//! [`ConfigTree::equivalent`]).

pub mod cluster;
pub mod job;

use std::collections::{BTreeMap, HashMap};

use crate::error::ValidationError;
use crate::tree::{ConfigSource, ConfigTree, Value};

pub use cluster::{expand_cluster, flatten_cluster, flatten_cluster_into};
pub use job::{JobTask, expand_job, fill_job_defaults, flatten_job, flatten_job_into};

type Result<T> = std::result::Result<T, ValidationError>;

/// Typed reader over one level of a [`ConfigSource`], tracking the field
/// path for error messages.
pub(crate) struct Fields<'a> {
    src: &'a dyn ConfigSource,
    path: String,
}

impl<'a> Fields<'a> {
    pub(crate) fn root(src: &'a dyn ConfigSource) -> Self {
        Self {
            src,
            path: String::new(),
        }
    }

    /// Reader for a block nested under `key`.
    pub(crate) fn nested<'b>(&self, key: &str, block: &'b ConfigTree) -> Fields<'b> {
        Fields {
            src: block,
            path: self.path_of(key),
        }
    }

    pub(crate) fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str, found: &Value) -> ValidationError {
        ValidationError::TypeMismatch {
            path: self.path_of(key),
            expected,
            found: found.type_name(),
        }
    }

    fn missing(&self, key: &str) -> ValidationError {
        ValidationError::MissingField {
            path: self.path_of(key),
        }
    }

    /// Which members of an exclusive group are populated. More than one is
    /// an error; otherwise the populated member, if any, is returned.
    pub(crate) fn exclusive(
        &self,
        group: &str,
        members: &[&'static str],
    ) -> Result<Option<&'static str>> {
        let set: Vec<&'static str> = members
            .iter()
            .copied()
            .filter(|m| self.src.get_if_present(m).is_some())
            .collect();
        match set.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            _ => Err(ValidationError::Conflict {
                group: self.path_of(group),
                fields: set.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    /// Like [`Fields::exclusive`], but exactly one member must be set.
    pub(crate) fn one_of(&self, group: &str, members: &[&'static str]) -> Result<&'static str> {
        self.exclusive(group, members)?
            .ok_or_else(|| ValidationError::NoneSet {
                group: self.path_of(group),
                fields: members.to_vec(),
            })
    }

    pub(crate) fn string(&self, key: &str) -> Result<Option<String>> {
        match self.src.get_if_present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.mismatch(key, "string", &other)),
        }
    }

    /// A required string. Presence is what counts; an explicit empty
    /// string is passed through.
    pub(crate) fn required_string(&self, key: &str) -> Result<String> {
        match self.src.get(key) {
            None => Err(self.missing(key)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(self.mismatch(key, "string", &other)),
        }
    }

    fn narrow(&self, key: &str, value: i64) -> Result<i32> {
        i32::try_from(value).map_err(|_| ValidationError::OutOfRange {
            path: self.path_of(key),
            value,
        })
    }

    pub(crate) fn int32(&self, key: &str) -> Result<Option<i32>> {
        match self.src.get_if_present(key) {
            None => Ok(None),
            Some(Value::Int(i)) => self.narrow(key, i).map(Some),
            Some(other) => Err(self.mismatch(key, "integer", &other)),
        }
    }

    pub(crate) fn required_int32(&self, key: &str) -> Result<i32> {
        match self.src.get(key) {
            None => Err(self.missing(key)),
            Some(Value::Int(i)) => self.narrow(key, i),
            Some(other) => Err(self.mismatch(key, "integer", &other)),
        }
    }

    pub(crate) fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.src.get_if_present(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(self.mismatch(key, "bool", &other)),
        }
    }

    /// Ordered list of strings; order is preserved.
    pub(crate) fn strings(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.src.get_if_present(key) {
            None => Ok(None),
            Some(Value::List(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(s) => Ok(s),
                    other => Err(self.mismatch(&format!("{}[{}]", key, i), "string", &other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(self.mismatch(key, "list", &other)),
        }
    }

    pub(crate) fn string_map(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        match self.src.get_if_present(key) {
            None => Ok(None),
            Some(value) => value
                .as_string_map()
                .map(|m| Some(m.into_iter().collect()))
                .ok_or_else(|| self.mismatch(key, "map of strings", &value)),
        }
    }

    /// All blocks under `key`. A lone block not wrapped in a list is
    /// accepted as a list of one.
    pub(crate) fn blocks(&self, key: &str) -> Result<Vec<ConfigTree>> {
        match self.src.get_if_present(key) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_block()
                        .ok_or_else(|| self.mismatch(&format!("{}[{}]", key, i), "block", item))
                })
                .collect(),
            Some(value) => value
                .as_block()
                .map(|b| vec![b])
                .ok_or_else(|| self.mismatch(key, "block", &value)),
        }
    }

    /// A singleton block: zero or one element.
    pub(crate) fn block(&self, key: &str) -> Result<Option<ConfigTree>> {
        let mut blocks = self.blocks(key)?;
        match blocks.len() {
            0 | 1 => Ok(blocks.pop()),
            found => Err(ValidationError::TooManyBlocks {
                path: self.path_of(key),
                found,
            }),
        }
    }
}

// Writers used by the flatten direction. Absent wire values become the
// zero value so every schema key is present in the produced tree.

pub(crate) fn put_string(dst: &mut dyn ConfigSource, key: &str, value: Option<&String>) {
    dst.set(key, Value::String(value.cloned().unwrap_or_default()));
}

pub(crate) fn put_int(dst: &mut dyn ConfigSource, key: &str, value: Option<i32>) {
    dst.set(key, Value::Int(i64::from(value.unwrap_or_default())));
}

pub(crate) fn put_bool(dst: &mut dyn ConfigSource, key: &str, value: Option<bool>) {
    dst.set(key, Value::Bool(value.unwrap_or_default()));
}

pub(crate) fn put_strings(dst: &mut dyn ConfigSource, key: &str, value: Option<&Vec<String>>) {
    let items = value
        .map(|v| v.iter().cloned().map(Value::String).collect())
        .unwrap_or_default();
    dst.set(key, Value::List(items));
}

pub(crate) fn put_map(dst: &mut dyn ConfigSource, key: &str, value: Option<&HashMap<String, String>>) {
    let map: BTreeMap<String, String> = value
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    dst.set(key, Value::Map(map));
}

/// Singleton block as a list of at most one element.
pub(crate) fn put_block(dst: &mut dyn ConfigSource, key: &str, block: Option<ConfigTree>) {
    let items = block.map(|b| vec![Value::Block(b)]).unwrap_or_default();
    dst.set(key, Value::List(items));
}
