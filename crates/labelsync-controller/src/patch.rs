//! Label patches.
//!
//! A patch records, per label key, whether to set or remove it; keys that are
//! absent stay untouched. It is only turned into a JSON Merge Patch document
//! when sent to the store.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOp {
    Set(String),
    Remove,
}

/// Minimal set of label changes for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPatch {
    ops: BTreeMap<String, LabelOp>,
}

impl LabelPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.ops.insert(key.into(), LabelOp::Set(value.into()));
    }

    pub fn remove(&mut self, key: impl Into<String>) {
        self.ops.insert(key.into(), LabelOp::Remove);
    }

    pub fn get(&self, key: &str) -> Option<&LabelOp> {
        self.ops.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelOp)> {
        self.ops.iter().map(|(k, op)| (k.as_str(), op))
    }

    /// `{"metadata":{"labels":{...}}}` with `null` for removals.
    pub fn to_merge_patch(&self) -> Value {
        let labels: Map<String, Value> = self
            .ops
            .iter()
            .map(|(key, op)| {
                let value = match op {
                    LabelOp::Set(value) => Value::String(value.clone()),
                    LabelOp::Remove => Value::Null,
                };
                (key.clone(), value)
            })
            .collect();
        json!({ "metadata": { "labels": labels } })
    }

    /// Serialized merge patch body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_merge_patch())
    }
}
