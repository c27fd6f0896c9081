//! `DataBlock`, `StoredDataBlock` and `DataSet` — the block-level data model
//! (spec §3).
//!
//! A block's identity and schema are immutable once created (invariant 1);
//! nothing in this module offers a way to mutate one after construction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::schema::SchemaRef;

/// Opaque identifier for a `DataBlock`. Creation order is tracked
/// separately (`DataBlock::created_at`) since UUIDs don't sort that way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BlockId(pub Uuid);

impl BlockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable batch of records of one schema.
///
/// `nominal_schema` is what the producing pipe declared; `realized_schema`
/// is what the engine actually observed (e.g. a generic `T` resolves to a
/// concrete name here). For non-generic pipes the two usually coincide.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataBlock {
    pub id: BlockId,
    pub nominal_schema: SchemaRef,
    pub realized_schema: SchemaRef,
    pub created_at: DateTime<Utc>,
}

impl DataBlock {
    pub fn new(nominal_schema: SchemaRef, realized_schema: SchemaRef, created_at: DateTime<Utc>) -> Self {
        Self {
            id: BlockId::new(),
            nominal_schema,
            realized_schema,
            created_at,
        }
    }
}

/// One (storage, format) materialization of a `DataBlock`. A block may have
/// many SDBs; the first is created when a pipe's output is persisted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredDataBlock {
    pub id: Uuid,
    pub block_id: BlockId,
    pub storage_url: String,
    pub data_format: String,
}

impl StoredDataBlock {
    pub fn new(block_id: BlockId, storage_url: impl Into<String>, data_format: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_id,
            storage_url: storage_url.into(),
            data_format: data_format.into(),
        }
    }
}

/// A named, accumulating view over one upstream node's outputs: presents as
/// a single "most recent" block to downstream consumers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataSet {
    pub name: String,
    pub latest_block_id: Option<BlockId>,
}

impl DataSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest_block_id: None,
        }
    }

    pub fn with_latest(name: impl Into<String>, latest_block_id: BlockId) -> Self {
        Self {
            name: name.into(),
            latest_block_id: Some(latest_block_id),
        }
    }
}
