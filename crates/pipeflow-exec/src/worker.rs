//! `Worker` — executes a single invocation: opens a run-session, calls the
//! pipe, conforms the output, logs inputs and output (spec §4.5).
//!
//! Grounded on `original_source/basis/core/runnable.py`'s `Worker.run` /
//! `Worker.execute_data_function` / `Worker.conform_output`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};

use pipeflow_core::{
    CoreError, CoreResult, DataBlock, DataBlockLog, Direction, FormatClass, ManagedBlock, Node,
    PipeDefinition, PipeError, PipeLog, PipeOutput, Storage, StoredDataBlock,
};

use crate::execution::{Executable, ExecutionContext};

/// What the Worker has to stage into the lineage log once a pipe's output
/// has been conformed (spec §4.5 step 4): the logged output block, the
/// freshly-materialized block (if any — omitted when the pipe handed back
/// a block/SDB it didn't create itself), and every SDB placement created
/// along the way (local materialization plus any `convert_lowest_cost`
/// copy onto the target storage).
struct Conformed {
    block: Option<DataBlock>,
    fresh_block: Option<DataBlock>,
    stored_blocks: Vec<StoredDataBlock>,
}

impl Conformed {
    fn none() -> Self {
        Self {
            block: None,
            fresh_block: None,
            stored_blocks: Vec::new(),
        }
    }

    fn passthrough(block: DataBlock) -> Self {
        Self {
            block: Some(block),
            fresh_block: None,
            stored_blocks: Vec::new(),
        }
    }
}

/// Concrete `pipeflow_core::pipe::PipeContext` implementation, carrying the
/// fields spec §6 describes: `execution_context`, `executable`, and a
/// `config` shortcut. `worker` itself is not exposed as a separate handle —
/// a pipe callable never needs more than its own context and inputs in this
/// engine (see DESIGN.md).
pub struct PipeContext<'a> {
    execution_context: &'a ExecutionContext,
    configuration: Value,
}

impl<'a> PipeContext<'a> {
    fn new(execution_context: &'a ExecutionContext, configuration: Value) -> Self {
        Self {
            execution_context,
            configuration,
        }
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        self.execution_context
    }
}

impl pipeflow_core::pipe::PipeContext for PipeContext<'_> {
    fn config(&self, key: &str) -> Option<Value> {
        self.configuration.get(key).cloned()
    }
}

pub struct Worker {
    ctx: ExecutionContext,
}

impl Worker {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Execute one invocation end to end: open a run session, call the
    /// pipe, conform the output, write input/output logs, commit or roll
    /// back atomically (spec §4.5, §5 transactional discipline).
    pub fn run(&self, node: &Node, executable: &Executable) -> CoreResult<Option<DataBlock>> {
        let started_at = Utc::now();
        let node_state = self.ctx.log_store.get_node_state(&node.key);
        let node_state_json = node_state.map(|s| s.state).unwrap_or(Value::Object(Default::default()));

        let mut pipe_log = PipeLog::start(
            node.key.clone(),
            executable.pipe_key.clone(),
            self.current_runtime_url(),
            executable.configuration.clone(),
            node_state_json.clone(),
            started_at,
        );
        // No mechanism here mutates NodeState mid-invocation (spec is silent
        // on how a pipe would do so); end state is the same snapshot the
        // invocation started with (see DESIGN.md).
        pipe_log.node_end_state = node_state_json;

        let outcome = self.invoke_and_conform(node, executable);
        let pipe_log_id = pipe_log.id;

        let mut txn = self.ctx.log_store.begin();
        match outcome {
            Ok(conformed) => {
                pipe_log.completed_at = Some(Utc::now());
                txn.add_pipe_log(pipe_log);

                let output_block = conformed.block;
                if let Some(block) = &output_block {
                    if let Some(fresh_block) = conformed.fresh_block {
                        txn.add_block(fresh_block);
                    }
                    for sdb in conformed.stored_blocks {
                        txn.add_stored_block(sdb);
                    }
                    txn.add_data_block_log(DataBlockLog::new(
                        pipe_log_id,
                        block.id,
                        Direction::Output,
                        Utc::now(),
                    ));
                }
                for input in &executable.bound.inputs {
                    if let Some(block) = &input.bound_block {
                        txn.add_data_block_log(DataBlockLog::new(
                            pipe_log_id,
                            block.id,
                            Direction::Input,
                            Utc::now(),
                        ));
                    }
                }
                txn.commit()?;
                debug!(node = %node.key, output = ?output_block.as_ref().map(|b| b.id), "worker invocation complete");
                Ok(output_block)
            }
            Err(e) => {
                pipe_log.set_error(PipeError::new(error_message(&e), format!("{e:?}")));
                pipe_log.completed_at = Some(Utc::now());
                txn.add_pipe_log(pipe_log);
                txn.commit()?;
                error!(node = %node.key, error = %e, "pipe invocation failed");
                Err(e)
            }
        }
    }

    fn current_runtime_url(&self) -> String {
        self.ctx
            .current_runtime
            .as_ref()
            .map(|r| r.url().to_string())
            .unwrap_or_default()
    }

    /// Build invocation args, call the pipe, and conform its output to a
    /// logged `DataBlock`. Returns the output block (if any) plus the
    /// freshly-created `(DataBlock, StoredDataBlock)` pair when one was
    /// materialized here (as opposed to a metadata value the pipe already
    /// owned), so the caller knows whether to stage `add_block`.
    fn invoke_and_conform(&self, node: &Node, executable: &Executable) -> CoreResult<Conformed> {
        let output = self.invoke(node, executable)?;
        if matches!(output, PipeOutput::None) {
            return Ok(Conformed::none());
        }

        // Mirrors `assert self.ctx.target_storage is not None` in the
        // source: required whenever the pipe produced *any* output.
        let target_storage = self
            .ctx
            .target_storage
            .clone()
            .ok_or_else(|| CoreError::MissingTargetStorage(node.key.clone()))?;

        self.conform_output(output, executable, target_storage.as_ref())
    }

    fn invoke(&self, node: &Node, executable: &Executable) -> CoreResult<PipeOutput> {
        let definition = executable.definition.as_ref();
        let callable = match definition {
            PipeDefinition::Callable(c) => c.clone(),
            PipeDefinition::Sql(_) => {
                return Err(CoreError::PipeFailure {
                    node_key: node.key.clone(),
                    message: "SQL-runtime execution is out of scope for this engine".to_string(),
                })
            }
        };

        let context = executable
            .bound
            .wants_context
            .then(|| PipeContext::new(&self.ctx, executable.configuration.clone()));
        let mgd_inputs = self.managed_inputs(&executable.bound);

        callable.invoke(
            context.as_ref().map(|c| c as &dyn pipeflow_core::pipe::PipeContext),
            mgd_inputs,
        )
    }

    fn managed_inputs(
        &self,
        bound: &crate::bound::BoundInterface,
    ) -> HashMap<String, ManagedBlock> {
        bound
            .as_invocation_args()
            .into_iter()
            .map(|(name, block)| {
                let storage = self.storage_holding(block.id);
                (name, ManagedBlock::new(block, storage))
            })
            .collect()
    }

    /// Find a storage in the execution context that already holds a
    /// materialization of `block_id`, falling back to local memory storage.
    /// `ManagedBlock::as_records` only pays the lookup cost when a pipe
    /// actually reads the block.
    fn storage_holding(&self, block_id: pipeflow_core::BlockId) -> Arc<dyn Storage> {
        self.ctx
            .storages
            .iter()
            .chain(self.ctx.target_storage.iter())
            .find(|s| s.find_sdb(block_id).is_some())
            .cloned()
            .unwrap_or_else(|| self.ctx.local_memory_storage.clone())
    }

    /// Output conformance (spec §4.5 step 4, conformance table).
    fn conform_output(
        &self,
        output: PipeOutput,
        executable: &Executable,
        target_storage: &dyn Storage,
    ) -> CoreResult<Conformed> {
        let nominal_schema = executable
            .bound
            .output
            .as_ref()
            .map(|a| a.schema_ref.clone())
            .unwrap_or(pipeflow_core::SchemaRef::Any);

        match output {
            PipeOutput::None => unreachable!("checked by caller"),
            PipeOutput::Block(block) => Ok(Conformed::passthrough(block)),
            PipeOutput::DataSet(dataset) => {
                let block_id = dataset.latest_block_id.ok_or_else(|| {
                    CoreError::UnsupportedOutputType {
                        pipe_key: executable.pipe_key.clone(),
                        detail: "DataSet output has no latest block".to_string(),
                    }
                })?;
                let block = self.ctx.log_store.get_block(block_id).ok_or_else(|| {
                    CoreError::UnsupportedOutputType {
                        pipe_key: executable.pipe_key.clone(),
                        detail: format!("no such block {block_id}"),
                    }
                })?;
                Ok(Conformed::passthrough(block))
            }
            PipeOutput::Stored(sdb) => {
                let block = self.ctx.log_store.get_block(sdb.block_id).ok_or_else(|| {
                    CoreError::UnsupportedOutputType {
                        pipe_key: executable.pipe_key.clone(),
                        detail: format!("no such block {}", sdb.block_id),
                    }
                })?;
                Ok(Conformed::passthrough(block))
            }
            PipeOutput::RecordsList(records) => {
                self.materialize_records(records, nominal_schema, target_storage, executable)
            }
            PipeOutput::RecordsGenerator(mut gen) => {
                let first = gen.next_chunk();
                let Some(first) = first else {
                    // Empty generator: no output (spec §4.5 step 4).
                    return Ok(Conformed::none());
                };
                let mut records = first;
                while let Some(chunk) = gen.next_chunk() {
                    records.extend(chunk);
                }
                self.materialize_records(records, nominal_schema, target_storage, executable)
            }
            PipeOutput::DataFrame(df) => {
                if df.is_empty() {
                    return Ok(Conformed::none());
                }
                self.materialize_dataframe(df, nominal_schema, target_storage, executable)
            }
            PipeOutput::DataFrameGenerator(mut gen) => {
                let Some(first) = gen.next_chunk() else {
                    return Ok(Conformed::none());
                };
                if first.is_empty() {
                    return Ok(Conformed::none());
                }
                self.materialize_dataframe(first, nominal_schema, target_storage, executable)
            }
        }
    }

    fn materialize_records(
        &self,
        records: pipeflow_core::RecordsList,
        nominal_schema: pipeflow_core::SchemaRef,
        target_storage: &dyn Storage,
        executable: &Executable,
    ) -> CoreResult<Conformed> {
        if expects_other_than_records(executable) {
            return Err(CoreError::UnsupportedOutputType {
                pipe_key: executable.pipe_key.clone(),
                detail: "pipe returned a records list but declared a non-records output format"
                    .to_string(),
            });
        }
        let (block, sdb) = self
            .ctx
            .local_memory_storage
            .create_block_from_records(records, nominal_schema, Utc::now())?;
        let mut stored_blocks = vec![sdb.clone()];
        let placed = self
            .ctx
            .local_memory_storage
            .convert_lowest_cost(&sdb, target_storage.url(), &target_storage.natural_format())?;
        if placed.id != sdb.id {
            stored_blocks.push(placed);
        }
        Ok(Conformed {
            block: Some(block.clone()),
            fresh_block: Some(block),
            stored_blocks,
        })
    }

    fn materialize_dataframe(
        &self,
        df: pipeflow_core::BoxedDataFrame,
        nominal_schema: pipeflow_core::SchemaRef,
        target_storage: &dyn Storage,
        executable: &Executable,
    ) -> CoreResult<Conformed> {
        if expects_other_than_dataframe(executable) {
            return Err(CoreError::UnsupportedOutputType {
                pipe_key: executable.pipe_key.clone(),
                detail: "pipe returned a dataframe but declared a non-dataframe output format"
                    .to_string(),
            });
        }
        let (block, sdb) = self
            .ctx
            .local_memory_storage
            .create_block_from_dataframe(df, nominal_schema, Utc::now())?;
        let mut stored_blocks = vec![sdb.clone()];
        let placed = self
            .ctx
            .local_memory_storage
            .convert_lowest_cost(&sdb, target_storage.url(), &target_storage.natural_format())?;
        if placed.id != sdb.id {
            stored_blocks.push(placed);
        }
        Ok(Conformed {
            block: Some(block.clone()),
            fresh_block: Some(block),
            stored_blocks,
        })
    }
}

/// The message recorded on a `PipeLog`'s `error` field. For `PipeFailure`,
/// `node_key` is already held by `PipeLog.node_key` itself, so the raw
/// callable message is used as-is rather than `CoreError`'s `Display`
/// (which would prefix it with `pipe '{node_key}' failed: ` a second time).
/// Every other error kind has no such redundant node-key prefix, so its
/// `Display` is used unchanged.
fn error_message(e: &CoreError) -> String {
    match e {
        CoreError::PipeFailure { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// A `RecordsList`/`RecordsListGenerator` output is only accepted for a
/// `DataBlock`/`RecordsList`/`RecordsListGenerator`-declared output slot.
fn expects_other_than_records(executable: &Executable) -> bool {
    match executable.bound.output.as_ref().map(|a| a.format_class) {
        None => false,
        Some(FormatClass::DataBlock)
        | Some(FormatClass::RecordsList)
        | Some(FormatClass::RecordsListGenerator) => false,
        Some(_) => true,
    }
}

/// A `DataFrame`/`DataFrameGenerator` output is only accepted for a
/// `DataBlock`/`DataFrame`/`DataFrameGenerator`-declared output slot.
fn expects_other_than_dataframe(executable: &Executable) -> bool {
    match executable.bound.output.as_ref().map(|a| a.format_class) {
        None => false,
        Some(FormatClass::DataBlock)
        | Some(FormatClass::DataFrame)
        | Some(FormatClass::DataFrameGenerator) => false,
        Some(_) => true,
    }
}
