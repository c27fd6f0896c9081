//! `NodeInterfaceManager` — discovers concrete input blocks for one node
//! in a given execution context and returns a `BoundInterface` (spec §4.3).

use std::collections::HashMap;

use pipeflow_core::{CoreError, CoreResult, DataBlock, FormatClass, Node, Pipe, SchemaRef};

use crate::bound::BoundInterface;
use crate::execution::ExecutionContext;

pub struct NodeInterfaceManager<'a> {
    ctx: &'a ExecutionContext,
    node: &'a Node,
    pipe: &'a Pipe,
}

impl<'a> NodeInterfaceManager<'a> {
    pub fn new(ctx: &'a ExecutionContext, node: &'a Node, pipe: &'a Pipe) -> Self {
        Self { ctx, node, pipe }
    }

    /// Build the connected interface (step 2) without picking blocks —
    /// exposed separately for callers (and tests) that only need to verify
    /// wiring without touching the log store.
    pub fn connected_interface(&self) -> CoreResult<BoundInterface> {
        let mut bound = BoundInterface::from_interface(&self.pipe.interface);
        let mut upstreams: HashMap<String, Node> = HashMap::new();
        for annotation in self.pipe.interface.non_self_ref_inputs() {
            let name = annotation.name.clone().expect("declared slots are named");
            let upstream_key = self.node.declared_inputs().get(&name).ok_or_else(|| {
                CoreError::InvalidInputAssignment(format!(
                    "no upstream declared for slot `{name}` of pipe `{}`",
                    self.pipe.key
                ))
            })?;
            let upstream = self.ctx.env.get_node(upstream_key)?;
            upstreams.insert(name, upstream);
        }
        for annotation in &self.pipe.interface.inputs {
            if annotation.is_self_ref {
                let name = annotation.name.clone().expect("declared slots are named");
                upstreams.insert(name, self.node.clone());
            }
        }
        bound.connect(&upstreams)?;
        Ok(bound)
    }

    /// Steps 3-6: derive a stream per connected slot, pick one block each,
    /// enforce the required-slot and exhaustion rules, and check generic
    /// schema coherence (invariant 3).
    pub fn bind(&self) -> CoreResult<BoundInterface> {
        let mut bound = self.connected_interface()?;
        let storage_allowlist = self.ctx.all_storage_urls();

        let mut blocks: HashMap<String, DataBlock> = HashMap::new();
        let mut any_bound = false;
        let mut any_unprocessed = false;
        let mut generic_resolution: HashMap<char, SchemaRef> = HashMap::new();

        for input in &bound.inputs {
            let upstream = input
                .bound_upstream
                .as_ref()
                .expect("connected_interface binds every slot's upstream");

            let mut stream = self.ctx.log_store.stream_for_node(&upstream.key);
            stream = stream.filter_storages(&storage_allowlist);

            let block = match input.annotation.format_class {
                FormatClass::DataBlock => {
                    stream = stream.filter_unprocessed(&self.node.key, input.annotation.is_self_ref);
                    stream.next()
                }
                FormatClass::DataSet => {
                    stream = stream.filter_dataset();
                    stream.most_recent()
                }
                other => {
                    return Err(CoreError::InvalidSignature(format!(
                        "`{other}` is not a valid binding input format class"
                    )))
                }
            };

            match &block {
                None => {
                    if input.annotation.is_required() {
                        return Err(CoreError::InputExhausted(format!(
                            "required input '{}' to pipe '{}' is empty",
                            input.name, self.pipe.key
                        )));
                    }
                }
                Some(b) => {
                    any_bound = true;
                    if let SchemaRef::Generic(label) = input.annotation.schema_ref {
                        match generic_resolution.get(&label) {
                            Some(existing) if *existing != b.realized_schema => {
                                return Err(CoreError::InvalidInputAssignment(format!(
                                    "generic `{label}` resolves to both `{existing}` and `{}` \
                                     across slots of pipe `{}`",
                                    b.realized_schema, self.pipe.key
                                )));
                            }
                            _ => {
                                generic_resolution.insert(label, b.realized_schema.clone());
                            }
                        }
                    }
                    blocks.insert(input.name.clone(), b.clone());
                }
            }

            match input.annotation.format_class {
                FormatClass::DataBlock => {
                    if block.is_some() {
                        any_unprocessed = true;
                    }
                }
                FormatClass::DataSet => {
                    if let Some(b) = &block {
                        if stream.is_unprocessed(b.id, &self.node.key) {
                            any_unprocessed = true;
                        }
                    }
                }
                _ => unreachable!("validated above"),
            }
        }

        if any_bound && !any_unprocessed {
            return Err(CoreError::InputExhausted("all inputs exhausted".to_string()));
        }

        bound.bind(blocks)?;
        self.specialize_output(&mut bound, &generic_resolution);
        Ok(bound)
    }

    /// Substitute the output annotation's generic label for the concrete
    /// schema observed across the bound inputs (spec §4.3 generic schema
    /// resolution, second pass). A generic output with nothing bound to
    /// resolve it (e.g. a source pipe) is left as-is.
    fn specialize_output(&self, bound: &mut BoundInterface, generic_resolution: &HashMap<char, SchemaRef>) {
        if let Some(output) = bound.output.as_mut() {
            let label = match &output.schema_ref {
                SchemaRef::Generic(label) => Some(*label),
                _ => None,
            };
            if let Some(label) = label {
                if let Some(resolved) = generic_resolution.get(&label) {
                    output.schema_ref = resolved.clone();
                }
            }
        }
    }
}
