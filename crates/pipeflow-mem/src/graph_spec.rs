//! `GraphSpec` — a YAML description of a DAG of pipe nodes, loaded with
//! `serde_yaml` (SPEC_FULL.md §4.8).
//!
//! Grounded on the teacher's `rde_core::PipelineSpec` for the "named list
//! of typed specs plus `serde`/`serde_yaml` round-trip" shape, but
//! describing a DAG of pipe nodes (each with named, by-key upstream
//! inputs) rather than a linear source/transform/sink chain with an
//! explicit edge list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pipeflow_core::node::Node;

/// One node in a `GraphSpec`: a pipe key, its named upstream inputs, an
/// optional output alias, and an opaque configuration map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub key: String,
    pub pipe: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    #[serde(default)]
    pub config: serde_json::Value,
    pub output_alias: Option<String>,
}

impl NodeSpec {
    /// Build the `Node` this spec describes.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(self.key.clone(), self.pipe.clone()).with_inputs(self.inputs.clone());
        if !self.config.is_null() {
            node = node.with_config(self.config.clone());
        }
        if let Some(alias) = &self.output_alias {
            node = node.with_output_alias(alias.clone());
        }
        node
    }
}

/// A full graph: a name plus its nodes, in declaration order.
///
/// Declaration order doubles as a valid topological order for every graph
/// this loader accepts — `pipeflow-cli` rejects a spec whose nodes are not
/// declared upstream-before-downstream (module loading and a general
/// topological sort are out of scope here, per spec §1's "CLI and module
/// loader" exclusion; this is the minimal loader SPEC_FULL.md §1 adds back
/// to make the workspace buildable and testable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub name: String,
    pub nodes: Vec<NodeSpec>,
}

impl GraphSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Verify every node's declared inputs reference a node key declared
    /// earlier in the list. Returns the offending `(node_key, slot_name,
    /// upstream_key)` on the first violation.
    pub fn check_topological_order(&self) -> Result<(), (String, String, String)> {
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for node in &self.nodes {
            for (slot, upstream) in &node.inputs {
                // A self-ref slot is the one permitted cycle (spec §3
                // invariant 5) — it is never a declared input anyway
                // (connected implicitly by the interface manager), but
                // guard against a spec author writing one explicitly.
                if upstream == &node.key {
                    continue;
                }
                if !seen.contains(upstream.as_str()) {
                    return Err((node.key.clone(), slot.clone(), upstream.clone()));
                }
            }
            seen.insert(&node.key);
        }
        Ok(())
    }
}
