//! `InMemoryEnvironment` — a reference `Environment` collaborator (spec §6):
//! resolves pipe keys, node keys, and named schemas from registries built up
//! front (module loading and general-purpose schema inference are out of
//! scope per spec §1).

use std::collections::HashMap;
use std::sync::RwLock;

use pipeflow_core::collaborator::Environment;
use pipeflow_core::error::{CoreError, CoreResult};
use pipeflow_core::node::{Node, NodeKey};
use pipeflow_core::pipe::Pipe;
use pipeflow_core::schema::SchemaRef;

#[derive(Default)]
pub struct InMemoryEnvironment {
    pipes: HashMap<String, Pipe>,
    nodes: RwLock<HashMap<NodeKey, Node>>,
    /// Named schemas this environment knows about. `Any` and generic labels
    /// never need a registry entry — only dotted names do.
    schemas: HashMap<String, SchemaRef>,
}

impl InMemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pipe(&mut self, pipe: Pipe) -> &mut Self {
        self.pipes.insert(pipe.key.clone(), pipe);
        self
    }

    pub fn register_schema(&mut self, name: impl Into<String>, schema: SchemaRef) -> &mut Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    pub fn register_node(&self, node: Node) {
        self.nodes.write().expect("node registry lock poisoned").insert(node.key.clone(), node);
    }
}

impl Environment for InMemoryEnvironment {
    fn get_schema(&self, schema_ref: &SchemaRef) -> CoreResult<SchemaRef> {
        match schema_ref {
            SchemaRef::Any | SchemaRef::Generic(_) => Ok(schema_ref.clone()),
            SchemaRef::Named(name) => self.schemas.get(name).cloned().ok_or_else(|| {
                CoreError::InvalidSignature(format!("unknown schema `{name}`"))
            }),
        }
    }

    fn get_pipe(&self, key: &str) -> CoreResult<Pipe> {
        self.pipes
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::InvalidSignature(format!("unknown pipe `{key}`")))
    }

    fn get_node(&self, key: &str) -> CoreResult<Node> {
        self.nodes
            .read()
            .expect("node registry lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::InvalidInputAssignment(format!("unknown node `{key}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_core::interface::PipeInterface;

    #[test]
    fn resolves_registered_pipe_and_node() {
        let mut env = InMemoryEnvironment::new();
        let pipe = Pipe::new(
            "noop",
            PipeInterface {
                inputs: vec![],
                output: None,
                wants_context: false,
            },
        );
        env.register_pipe(pipe);
        env.register_node(Node::new("n1", "noop"));

        assert_eq!(env.get_pipe("noop").unwrap().key, "noop");
        assert_eq!(env.get_node("n1").unwrap().key, "n1");
        assert!(env.get_pipe("missing").is_err());
    }

    #[test]
    fn any_and_generic_schema_pass_through() {
        let env = InMemoryEnvironment::new();
        assert_eq!(env.get_schema(&SchemaRef::Any).unwrap(), SchemaRef::Any);
        assert_eq!(
            env.get_schema(&SchemaRef::Generic('T')).unwrap(),
            SchemaRef::Generic('T')
        );
        assert!(env.get_schema(&SchemaRef::Named("nope".to_string())).is_err());
    }
}
