//! Lineage logging types: `PipeLog`, `DataBlockLog`, `NodeState` (spec §3,
//! §6 persisted-state layout).

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::block::BlockId;
use crate::error::PipeError;
use crate::node::NodeKey;

/// Whether a block was consumed or produced by a given `PipeLog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Input,
    Output,
}

/// One execution record: `{id, node_key, pipe_key, node_start_state,
/// node_end_state, runtime_url, started_at, completed_at, error?}`.
///
/// `graph_hash` is recovered from `dags.core.node.PipeLog.graph_id`
/// (see SPEC_FULL.md §3 supplementary entities) — the graph layer computes
/// it, this engine only threads it through.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipeLog {
    pub id: Uuid,
    pub node_key: NodeKey,
    pub pipe_key: String,
    pub graph_hash: Option<String>,
    pub node_start_state: Value,
    pub node_end_state: Value,
    pub pipe_config: Value,
    pub runtime_url: String,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<PipeError>,
}

impl PipeLog {
    pub fn start(
        node_key: impl Into<String>,
        pipe_key: impl Into<String>,
        runtime_url: impl Into<String>,
        pipe_config: Value,
        node_start_state: Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_key: node_key.into(),
            pipe_key: pipe_key.into(),
            graph_hash: None,
            node_start_state,
            node_end_state: Value::Null,
            pipe_config,
            runtime_url: runtime_url.into(),
            queued_at: None,
            started_at: Some(started_at),
            completed_at: None,
            error: None,
        }
    }

    pub fn set_error(&mut self, error: PipeError) {
        self.error = Some(error);
    }
}

/// Per-block input/output record: `{pipe_log_id, block_id, direction,
/// processed_at}`. A `(pipe_log, block, direction)` triple is unique
/// (invariant 4) — enforced by the `LogStore` collaborator, not this type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DataBlockLog {
    pub id: Uuid,
    pub pipe_log_id: Uuid,
    pub block_id: BlockId,
    pub direction: Direction,
    pub processed_at: DateTime<Utc>,
}

impl DataBlockLog {
    pub fn new(pipe_log_id: Uuid, block_id: BlockId, direction: Direction, processed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipe_log_id,
            block_id,
            direction,
            processed_at,
        }
    }
}

/// `{node_key -> opaque JSON state}`, persisted across runs so a pipe can
/// carry forward incremental state (e.g. a watermark) between invocations.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeState {
    pub node_key: NodeKey,
    pub state: Value,
}
