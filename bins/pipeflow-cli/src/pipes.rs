//! Built-in pipe registry for `pipeflow-cli` demo graphs.
//!
//! Module loading and general-purpose pipe resolution are out of scope
//! (spec §1); this is the minimal registry the loader needs to exercise
//! the run loop end to end, the way the teacher's `rde-tx::create_transform`
//! matches a `TransformSpec` tag against a small built-in set.

use std::collections::HashMap;

use pipeflow_core::annotation::RawParameter;
use pipeflow_core::error::{CoreError, CoreResult};
use pipeflow_core::interface::PipeInterface;
use pipeflow_core::managed::ManagedBlock;
use pipeflow_core::output::PipeOutput;
use pipeflow_core::pipe::{Pipe, PipeContext, PipeDefinition};
use pipeflow_core::RuntimeClass;

/// `() -> RecordsList[Any]`: emits the JSON array configured under the
/// node's `records` config key, once per run (a source pipe — no declared
/// inputs).
fn literal_source() -> CoreResult<Pipe> {
    let interface = PipeInterface::from_signature(&[RawParameter::new("context", "PipeContext")], Some("RecordsList"))?;
    let callable = move |context: Option<&dyn PipeContext>, _inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let context = context.ok_or_else(|| CoreError::InvalidSignature("literal_source requires context".to_string()))?;
        let records = context
            .config("records")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        let records = records
            .into_iter()
            .map(|v| match v {
                serde_json::Value::Object(m) => Ok(m),
                other => Err(CoreError::UnsupportedOutputType {
                    pipe_key: "literal_source".to_string(),
                    detail: format!("config record is not an object: {other}"),
                }),
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(PipeOutput::RecordsList(records))
    };
    Ok(Pipe::new("literal_source", interface)
        .with_definition(RuntimeClass::Local, PipeDefinition::Callable(std::sync::Arc::new(callable))))
}

/// `(input: DataBlock[Any]) -> DataBlock[Any]`: re-logs its bound input
/// block as its own output, unchanged. Demonstrates the `PipeOutput::Block`
/// passthrough conformance path (spec §4.5 step 3/4).
fn passthrough() -> CoreResult<Pipe> {
    let interface = PipeInterface::from_signature(&[RawParameter::new("input", "DataBlock")], Some("DataBlock"))?;
    let callable = move |_context: Option<&dyn PipeContext>, inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let input = inputs.get("input").ok_or_else(|| CoreError::InvalidInputAssignment("missing `input` slot".to_string()))?;
        Ok(PipeOutput::Block(input.block().clone()))
    };
    Ok(Pipe::new("passthrough", interface)
        .with_definition(RuntimeClass::Local, PipeDefinition::Callable(std::sync::Arc::new(callable))))
}

pub fn builtin_pipes() -> HashMap<String, Pipe> {
    let mut pipes = HashMap::new();
    for pipe in [literal_source(), passthrough()] {
        match pipe {
            Ok(p) => {
                pipes.insert(p.key.clone(), p);
            }
            Err(e) => panic!("built-in pipe failed to register: {e}"),
        }
    }
    pipes
}
