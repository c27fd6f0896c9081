//! `InMemoryLogStore` — a reference `LogStore`/`LogTransaction` collaborator
//! (spec §6 persisted-state layout), backed by a single `Mutex`-guarded
//! table set so `commit` can apply every staged write atomically
//! (spec §5 transactional discipline).
//!
//! Grounded on `crates/rde-io` for the "concrete impl crate next to the
//! trait crate" shape; exact semantics grounded on
//! `original_source/basis/core/runnable.py`'s `RunSession.log`/`log_input`/
//! `log_output` and `original_source/dags/core/node.py`'s `PipeLog`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use pipeflow_core::block::{BlockId, DataBlock, DataSet, StoredDataBlock};
use pipeflow_core::collaborator::{LogStore, LogTransaction, StreamSource};
use pipeflow_core::context::RuntimeClass;
use pipeflow_core::error::CoreResult;
use pipeflow_core::log::{DataBlockLog, Direction, NodeState, PipeLog};
use pipeflow_core::node::NodeKey;
use uuid::Uuid;

use crate::stream::InMemoryStreamSource;

#[derive(Default)]
pub(crate) struct LogState {
    pipe_logs: Vec<PipeLog>,
    data_block_logs: Vec<DataBlockLog>,
    blocks: HashMap<BlockId, DataBlock>,
    stored_blocks: HashMap<Uuid, StoredDataBlock>,
    datasets: HashMap<String, DataSet>,
    node_states: HashMap<NodeKey, NodeState>,
    aliases: HashMap<String, NodeKey>,
    /// Output block ids per node, in creation order — the candidate list a
    /// `StreamSource` filters down.
    node_outputs: HashMap<NodeKey, Vec<BlockId>>,
    /// `(node_key, block_id)` pairs already logged as INPUT, for
    /// `is_logged_input`/`StreamSource::is_unprocessed`.
    pub(crate) logged_inputs: HashSet<(NodeKey, BlockId)>,
}

pub(crate) type SharedLogState = Arc<Mutex<LogState>>;

#[derive(Default)]
pub struct InMemoryLogStore {
    state: Arc<Mutex<LogState>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().expect("in-memory log store mutex poisoned")
    }
}

impl LogStore for InMemoryLogStore {
    fn begin(&self) -> Box<dyn LogTransaction + '_> {
        Box::new(InMemoryLogTransaction {
            store: &self.state,
            pipe_logs: Vec::new(),
            data_block_logs: Vec::new(),
            blocks: Vec::new(),
            stored_blocks: Vec::new(),
            datasets: Vec::new(),
            node_states: Vec::new(),
            aliases: Vec::new(),
        })
    }

    fn is_logged_input(&self, node_key: &str, block_id: BlockId) -> bool {
        self.lock().logged_inputs.contains(&(node_key.to_string(), block_id))
    }

    fn outputs_for_node(&self, node_key: &str) -> Vec<DataBlock> {
        let state = self.lock();
        state
            .node_outputs
            .get(node_key)
            .into_iter()
            .flatten()
            .filter_map(|id| state.blocks.get(id).cloned())
            .collect()
    }

    fn latest_output(&self, node_key: &str) -> Option<DataBlock> {
        self.outputs_for_node(node_key).into_iter().next_back()
    }

    fn get_block(&self, block_id: BlockId) -> Option<DataBlock> {
        self.lock().blocks.get(&block_id).cloned()
    }

    fn resolve_alias(&self, name: &str) -> Option<NodeKey> {
        self.lock().aliases.get(name).cloned()
    }

    fn get_node_state(&self, node_key: &str) -> Option<NodeState> {
        self.lock().node_states.get(node_key).cloned()
    }

    fn compatible_runtimes_seen(&self, _node_key: &str) -> HashSet<RuntimeClass> {
        // `PipeLog` only records a runtime *url* (spec §3), and `Runtime`
        // (url -> class) is a separate collaborator this log store never
        // sees; there is no way to recover a class from a url here. No
        // caller in this workspace exercises this method today — see
        // DESIGN.md.
        HashSet::new()
    }

    fn stream_for_node(&self, node_key: &str) -> Box<dyn StreamSource> {
        Box::new(InMemoryStreamSource::new(
            node_key.to_string(),
            self.outputs_for_node(node_key),
            self.state.clone(),
        ))
    }
}

struct InMemoryLogTransaction<'a> {
    store: &'a Arc<Mutex<LogState>>,
    pipe_logs: Vec<PipeLog>,
    data_block_logs: Vec<DataBlockLog>,
    blocks: Vec<DataBlock>,
    stored_blocks: Vec<StoredDataBlock>,
    datasets: Vec<DataSet>,
    node_states: Vec<(NodeKey, NodeState)>,
    aliases: Vec<(String, NodeKey)>,
}

impl LogTransaction for InMemoryLogTransaction<'_> {
    fn add_pipe_log(&mut self, log: PipeLog) {
        self.pipe_logs.push(log);
    }

    fn add_data_block_log(&mut self, log: DataBlockLog) {
        self.data_block_logs.push(log);
    }

    fn add_block(&mut self, block: DataBlock) {
        self.blocks.push(block);
    }

    fn add_stored_block(&mut self, sdb: StoredDataBlock) {
        self.stored_blocks.push(sdb);
    }

    fn upsert_dataset(&mut self, dataset: DataSet) {
        self.datasets.push(dataset);
    }

    fn set_node_state(&mut self, node_key: &str, state: NodeState) {
        self.node_states.push((node_key.to_string(), state));
    }

    fn set_alias(&mut self, alias: &str, node_key: &str) {
        self.aliases.push((alias.to_string(), node_key.to_string()));
    }

    fn commit(self: Box<Self>) -> CoreResult<()> {
        let mut state = self.store.lock().expect("in-memory log store mutex poisoned");

        for block in self.blocks {
            state.blocks.insert(block.id, block);
        }
        for sdb in self.stored_blocks {
            state.stored_blocks.insert(sdb.id, sdb);
        }
        // Map pipe_log_id -> node_key so DataBlockLog rows (which don't
        // carry node_key themselves) can be attributed to a node.
        let node_by_pipe_log: HashMap<Uuid, NodeKey> =
            self.pipe_logs.iter().map(|p| (p.id, p.node_key.clone())).collect();

        for log in &self.data_block_logs {
            let Some(node_key) = node_by_pipe_log.get(&log.pipe_log_id) else {
                continue;
            };
            match log.direction {
                Direction::Output => {
                    state.node_outputs.entry(node_key.clone()).or_default().push(log.block_id);
                }
                Direction::Input => {
                    state.logged_inputs.insert((node_key.clone(), log.block_id));
                }
            }
        }

        state.pipe_logs.extend(self.pipe_logs);
        state.data_block_logs.extend(self.data_block_logs);
        for dataset in self.datasets {
            state.datasets.insert(dataset.name.clone(), dataset);
        }
        for (node_key, node_state) in self.node_states {
            state.node_states.insert(node_key, node_state);
        }
        for (alias, node_key) in self.aliases {
            state.aliases.insert(alias, node_key);
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        // Everything above was only ever staged on this transaction value;
        // dropping it without committing discards all of it (spec §5: "the
        // output block is not visible to later iterations").
    }
}
