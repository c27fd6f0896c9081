//! `Node` — a named, configured instance of a pipe in the graph (spec §3).
//!
//! Immutable after construction: inputs and configuration are fixed at
//! `Node::new` time, mirroring the source's frozen dataclass.

use std::collections::HashMap;

use serde_json::Value;

pub type NodeKey = String;

/// A `Node`'s declared, raw inputs: each named slot maps to an upstream
/// node key. The distinguished `this` slot is never present here — it is
/// connected implicitly to the node itself by the interface manager.
pub type DeclaredInputs = HashMap<String, NodeKey>;

/// A configured pipe instance within a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: NodeKey,
    pub pipe_key: String,
    declared_inputs: DeclaredInputs,
    pub config: Value,
    /// Optional human name the node's latest output can also be resolved
    /// by (recovered from `snapflow`'s `output_alias`; see DESIGN.md).
    pub output_alias: Option<String>,
}

impl Node {
    pub fn new(key: impl Into<String>, pipe_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pipe_key: pipe_key.into(),
            declared_inputs: HashMap::new(),
            config: Value::Object(Default::default()),
            output_alias: None,
        }
    }

    pub fn with_input(mut self, slot: impl Into<String>, upstream: impl Into<String>) -> Self {
        self.declared_inputs.insert(slot.into(), upstream.into());
        self
    }

    pub fn with_inputs(mut self, inputs: DeclaredInputs) -> Self {
        self.declared_inputs = inputs;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_output_alias(mut self, alias: impl Into<String>) -> Self {
        self.output_alias = Some(alias.into());
        self
    }

    pub fn declared_inputs(&self) -> &DeclaredInputs {
        &self.declared_inputs
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}
