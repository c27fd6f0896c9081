//! Collaborator traits: the engine's contracts with its environment,
//! storage, lineage-log and candidate-block-stream collaborators (spec
//! §1, §4.6, §6). None of these are given a production implementation
//! here — only the in-memory reference implementation in `pipeflow-mem`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::block::{BlockId, DataBlock, DataSet, StoredDataBlock};
use crate::context::RuntimeClass;
use crate::error::CoreResult;
use crate::format::{BoxedDataFrame, RecordsList};
use crate::log::{DataBlockLog, NodeState, PipeLog};
use crate::node::{Node, NodeKey};
use crate::pipe::Pipe;
use crate::schema::SchemaRef;

/// Resolves types and pipes (spec §6). The registry/module-loader that
/// backs a production `Environment` is out of scope here — this is only
/// the seam the engine calls through. Storages and runtimes are not
/// methods here; they're assembled directly on the execution context by
/// the caller, mirroring the source's `ExecutionContext` dataclass
/// (`env`, `storages`, `runtimes`, `target_storage`, `local_memory_storage`).
pub trait Environment: Send + Sync {
    fn get_schema(&self, schema_ref: &SchemaRef) -> CoreResult<SchemaRef>;
    fn get_pipe(&self, key: &str) -> CoreResult<Pipe>;
    fn get_node(&self, key: &str) -> CoreResult<Node>;
}

/// Block materialization and cross-storage placement (spec §6). The
/// storage engines and copy matrix themselves are external collaborators;
/// this is only the narrow surface the Worker needs.
pub trait Storage: Send + Sync {
    fn url(&self) -> &str;
    /// The format this storage prefers for newly-placed data (used to pick
    /// `target_format` when the Worker conforms output, spec §4.5 step 4).
    fn natural_format(&self) -> String;

    /// Materialize a freshly-produced records payload into a new
    /// `(DataBlock, StoredDataBlock)` pair on this storage, in local-memory
    /// format. Mirrors `create_data_block_from_records`.
    fn create_block_from_records(
        &self,
        records: RecordsList,
        nominal_schema: SchemaRef,
        created_at: DateTime<Utc>,
    ) -> CoreResult<(DataBlock, StoredDataBlock)>;

    /// Materialize a freshly-produced dataframe payload, for pipes declared
    /// with a `DataFrame`/`DataFrameGenerator` output format class. Mirrors
    /// `create_block_from_records` but for the dataframe payload shape;
    /// interpreting columns and rows remains the storage collaborator's
    /// concern (this crate only needs emptiness, via `DataFramePayload`).
    fn create_block_from_dataframe(
        &self,
        dataframe: BoxedDataFrame,
        nominal_schema: SchemaRef,
        created_at: DateTime<Utc>,
    ) -> CoreResult<(DataBlock, StoredDataBlock)>;

    /// Produce a new SDB on `target_storage` in `target_format`, at lowest
    /// conversion cost; a no-op if an equivalent SDB is already present
    /// there. Mirrors `convert_lowest_cost`.
    fn convert_lowest_cost(
        &self,
        sdb: &StoredDataBlock,
        target_storage: &str,
        target_format: &str,
    ) -> CoreResult<StoredDataBlock>;

    /// Read back a block's records, for `ManagedBlock` materialization.
    fn read_records(&self, sdb: &StoredDataBlock) -> CoreResult<RecordsList>;

    /// Find an existing SDB for `block_id` on this storage, if any. Used by
    /// `ManagedBlock` to locate what to read without the caller having to
    /// thread an SDB reference through the invocation path.
    fn find_sdb(&self, block_id: BlockId) -> Option<StoredDataBlock>;
}

/// Lineage persistence (spec §6 persisted-state layout). All writes within
/// one `Worker` invocation must commit or roll back atomically (§5
/// transactional discipline) — that's why this trait exposes an explicit
/// transaction boundary instead of committing each call immediately.
pub trait LogStore: Send + Sync {
    /// Begin a transaction scope; all subsequent writes through the
    /// returned handle are visible to `is_logged_input`/`latest_output`
    /// only after `commit`.
    fn begin(&self) -> Box<dyn LogTransaction + '_>;

    /// Whether `block` has already been logged as INPUT for `node` (used
    /// by the unprocessed filter, spec §4.3 step 3 and invariant 5).
    fn is_logged_input(&self, node_key: &str, block_id: BlockId) -> bool;

    /// All blocks logged as OUTPUT for `node`, oldest first.
    fn outputs_for_node(&self, node_key: &str) -> Vec<DataBlock>;

    /// The most recently logged OUTPUT block for `node`, if any.
    fn latest_output(&self, node_key: &str) -> Option<DataBlock>;

    /// Look up a previously-created block by id, regardless of which node
    /// produced it. Used to resolve a bare `StoredDataBlock` a pipe returns
    /// directly (spec §4.5 step 3) back to its owning `DataBlock`.
    fn get_block(&self, block_id: BlockId) -> Option<DataBlock>;

    /// Resolve a `DataSet`/output alias to its underlying node key
    /// (SPEC_FULL.md supplementary "Alias" entity).
    fn resolve_alias(&self, name: &str) -> Option<NodeKey>;

    fn get_node_state(&self, node_key: &str) -> Option<NodeState>;

    fn compatible_runtimes_seen(&self, node_key: &str) -> HashSet<RuntimeClass>;

    /// Build a `StreamSource` enumerating `node_key`'s logged OUTPUT
    /// blocks in creation order (mirrors `Node.as_stream()` /
    /// `DataBlockStream(upstream=self)`). `NodeInterfaceManager` calls this
    /// once per connected input slot.
    fn stream_for_node(&self, node_key: &str) -> Box<dyn StreamSource>;
}

/// A scoped write transaction over one `Worker` invocation.
pub trait LogTransaction {
    fn add_pipe_log(&mut self, log: PipeLog);
    fn add_data_block_log(&mut self, log: DataBlockLog);
    fn add_block(&mut self, block: DataBlock);
    fn add_stored_block(&mut self, sdb: StoredDataBlock);
    fn upsert_dataset(&mut self, dataset: DataSet);
    fn set_node_state(&mut self, node_key: &str, state: NodeState);
    fn set_alias(&mut self, alias: &str, node_key: &str);

    /// Persist everything staged in this transaction.
    fn commit(self: Box<Self>) -> CoreResult<()>;
    /// Discard everything staged in this transaction (spec §5: "the output
    /// block is not visible to later iterations").
    fn rollback(self: Box<Self>);
}

/// A lazy, filterable source of candidate blocks from one upstream node
/// (spec §4.6). `NodeInterfaceManager` is generic over this trait, not a
/// concrete implementation — `pipeflow-mem::InMemoryStreamSource` is the
/// only one this workspace ships.
pub trait StreamSource {
    fn filter_storages(self: Box<Self>, storages: &[String]) -> Box<dyn StreamSource>;
    fn filter_unprocessed(self: Box<Self>, node_key: &str, allow_cycle: bool) -> Box<dyn StreamSource>;
    fn filter_dataset(self: Box<Self>) -> Box<dyn StreamSource>;

    /// Oldest surviving candidate by creation order (ties by block id).
    fn next(&self) -> Option<DataBlock>;
    /// Newest surviving candidate.
    fn most_recent(&self) -> Option<DataBlock>;
    /// Whether `block` has not yet been logged as INPUT for `node_key`,
    /// i.e. whether it would still appear after `filter_unprocessed`.
    fn is_unprocessed(&self, block_id: BlockId, node_key: &str) -> bool;
}
