//! `NodeInput` and `BoundInterface` — a `PipeInterface` whose slots have
//! been connected (upstream assigned) and bound (block chosen), spec §4.2.

use std::collections::HashMap;

use pipeflow_core::{CoreError, CoreResult, DataBlock, Node, PipeAnnotation, PipeInterface};

/// A slot on a node: `{name, annotation, bound_upstream, bound_block}`.
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub name: String,
    pub annotation: PipeAnnotation,
    pub bound_upstream: Option<Node>,
    pub bound_block: Option<DataBlock>,
}

impl NodeInput {
    fn new(annotation: PipeAnnotation) -> Self {
        let name = annotation
            .name
            .clone()
            .expect("declared input slots are always named");
        Self {
            name,
            annotation,
            bound_upstream: None,
            bound_block: None,
        }
    }
}

/// A `PipeInterface` whose slots have been connected and bound, ready to
/// invoke.
#[derive(Debug, Clone)]
pub struct BoundInterface {
    pub inputs: Vec<NodeInput>,
    pub output: Option<PipeAnnotation>,
    pub wants_context: bool,
}

impl BoundInterface {
    pub fn from_interface(interface: &PipeInterface) -> Self {
        Self {
            inputs: interface.inputs.iter().cloned().map(NodeInput::new).collect(),
            output: interface.output.clone(),
            wants_context: interface.wants_context,
        }
    }

    pub fn get_input(&self, name: &str) -> CoreResult<&NodeInput> {
        self.inputs
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| CoreError::InvalidInputAssignment(format!("no such slot `{name}`")))
    }

    fn get_input_mut(&mut self, name: &str) -> CoreResult<&mut NodeInput> {
        self.inputs
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| CoreError::InvalidInputAssignment(format!("no such slot `{name}`")))
    }

    /// Set `bound_upstream` on each named slot. The self-ref `this` slot is
    /// expected to already be present in `upstreams` (the interface
    /// manager connects it to the node itself before calling this).
    pub fn connect(&mut self, upstreams: &HashMap<String, Node>) -> CoreResult<()> {
        for (name, node) in upstreams {
            self.get_input_mut(name)?.bound_upstream = Some(node.clone());
        }
        Ok(())
    }

    /// Set `bound_block` on each named slot.
    pub fn bind(&mut self, blocks: HashMap<String, DataBlock>) -> CoreResult<()> {
        for (name, block) in blocks {
            self.get_input_mut(&name)?.bound_block = Some(block);
        }
        Ok(())
    }

    /// Materialize the keyword arguments, excluding unbound (optional)
    /// slots.
    pub fn as_invocation_args(&self) -> HashMap<String, DataBlock> {
        self.inputs
            .iter()
            .filter_map(|i| i.bound_block.clone().map(|b| (i.name.clone(), b)))
            .collect()
    }

    pub fn is_empty_inputs(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pipeflow_core::{AnnotationParser, RawParameter, SchemaRef};

    fn annotation(name: &str, ty: &str) -> PipeAnnotation {
        let p = RawParameter::new(name, ty);
        match AnnotationParser::parse_parameter(&p).unwrap() {
            pipeflow_core::annotation::ParsedParameter::Data(a) => a,
            _ => panic!("expected data annotation"),
        }
    }

    #[test]
    fn connect_and_bind_round_trip() {
        let interface = PipeInterface {
            inputs: vec![annotation("input", "DataBlock[T1]")],
            output: None,
            wants_context: false,
        };
        let mut bound = BoundInterface::from_interface(&interface);
        let upstream = Node::new("src", "src_pipe");
        let mut upstreams = HashMap::new();
        upstreams.insert("input".to_string(), upstream);
        bound.connect(&upstreams).unwrap();
        assert!(bound.get_input("input").unwrap().bound_upstream.is_some());

        let block = DataBlock::new(SchemaRef::Named("T1".into()), SchemaRef::Named("T1".into()), Utc::now());
        let mut blocks = HashMap::new();
        blocks.insert("input".to_string(), block.clone());
        bound.bind(blocks).unwrap();
        let args = bound.as_invocation_args();
        assert_eq!(args.get("input"), Some(&block));
    }

    #[test]
    fn unbound_optional_excluded_from_invocation_args() {
        let interface = PipeInterface {
            inputs: vec![annotation("input", "Optional[DataBlock[T1]]")],
            output: None,
            wants_context: false,
        };
        let bound = BoundInterface::from_interface(&interface);
        assert!(bound.as_invocation_args().is_empty());
    }
}
