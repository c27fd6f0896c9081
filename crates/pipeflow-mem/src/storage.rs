//! `InMemoryStorage` — a reference `Storage` collaborator (spec §6) backed
//! by process memory.
//!
//! Grounded on `crates/rde-io` for the pattern of a concrete operator crate
//! sitting next to the teacher's trait crate, but standing in for the
//! source's `PythonStorageApi`/`FileSystemStorageApi` matrix: there is no
//! byte-level format here to transcode between, so several named storages
//! in one `ExecutionContext` share one backing map and `convert_lowest_cost`
//! only records a new placement rather than doing real I/O (see DESIGN.md).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use pipeflow_core::block::{BlockId, DataBlock, StoredDataBlock};
use pipeflow_core::collaborator::Storage;
use pipeflow_core::error::{CoreError, CoreResult};
use pipeflow_core::format::{BoxedDataFrame, RecordsList};
use pipeflow_core::schema::SchemaRef;

use crate::dataframe::ArrowDataFrame;

pub const RECORDS_FORMAT: &str = "records_list";
pub const DATAFRAME_FORMAT: &str = "arrow_record_batch";

#[derive(Default)]
struct SharedStore {
    records: HashMap<BlockId, RecordsList>,
    dataframes: HashMap<BlockId, ArrowDataFrame>,
    /// Every SDB ever created for a block, across every named storage that
    /// shares this backing store.
    placements: HashMap<BlockId, Vec<StoredDataBlock>>,
}

/// A named storage location. Construct a family of these with
/// [`InMemoryStorage::sibling`] to model more than one storage inside the
/// same process, the way a test wires up a "local memory" storage and a
/// separate "target" storage.
pub struct InMemoryStorage {
    url: String,
    natural_format: String,
    shared: Arc<Mutex<SharedStore>>,
}

impl InMemoryStorage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            natural_format: RECORDS_FORMAT.to_string(),
            shared: Arc::new(Mutex::new(SharedStore::default())),
        }
    }

    pub fn with_natural_format(mut self, format: impl Into<String>) -> Self {
        self.natural_format = format.into();
        self
    }

    /// A second named storage backed by the same process memory.
    pub fn sibling(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            natural_format: self.natural_format.clone(),
            shared: self.shared.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SharedStore> {
        self.shared.lock().expect("in-memory store mutex poisoned")
    }
}

impl Storage for InMemoryStorage {
    fn url(&self) -> &str {
        &self.url
    }

    fn natural_format(&self) -> String {
        self.natural_format.clone()
    }

    fn create_block_from_records(
        &self,
        records: RecordsList,
        nominal_schema: SchemaRef,
        created_at: DateTime<Utc>,
    ) -> CoreResult<(DataBlock, StoredDataBlock)> {
        let block = DataBlock::new(nominal_schema.clone(), nominal_schema, created_at);
        let sdb = StoredDataBlock::new(block.id, &self.url, RECORDS_FORMAT);
        let mut store = self.lock();
        store.records.insert(block.id, records);
        store.placements.entry(block.id).or_default().push(sdb.clone());
        Ok((block, sdb))
    }

    fn create_block_from_dataframe(
        &self,
        dataframe: BoxedDataFrame,
        nominal_schema: SchemaRef,
        created_at: DateTime<Utc>,
    ) -> CoreResult<(DataBlock, StoredDataBlock)> {
        let arrow_df = dataframe
            .as_any()
            .downcast_ref::<ArrowDataFrame>()
            .ok_or_else(|| CoreError::UnsupportedOutputType {
                pipe_key: "<storage>".to_string(),
                detail: "pipeflow-mem only accepts ArrowDataFrame payloads".to_string(),
            })?
            .clone();
        let block = DataBlock::new(nominal_schema.clone(), nominal_schema, created_at);
        let sdb = StoredDataBlock::new(block.id, &self.url, DATAFRAME_FORMAT);
        let mut store = self.lock();
        store.dataframes.insert(block.id, arrow_df);
        store.placements.entry(block.id).or_default().push(sdb.clone());
        Ok((block, sdb))
    }

    fn convert_lowest_cost(
        &self,
        sdb: &StoredDataBlock,
        target_storage: &str,
        target_format: &str,
    ) -> CoreResult<StoredDataBlock> {
        let mut store = self.lock();
        let existing = store
            .placements
            .get(&sdb.block_id)
            .and_then(|sdbs| {
                sdbs.iter()
                    .find(|s| s.storage_url == target_storage && s.data_format == target_format)
            })
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let placed = StoredDataBlock::new(sdb.block_id, target_storage, target_format);
        store.placements.entry(sdb.block_id).or_default().push(placed.clone());
        Ok(placed)
    }

    fn read_records(&self, sdb: &StoredDataBlock) -> CoreResult<RecordsList> {
        let store = self.lock();
        store.records.get(&sdb.block_id).cloned().ok_or_else(|| {
            CoreError::UnsupportedOutputType {
                pipe_key: "<storage>".to_string(),
                detail: format!("no records materialization for block {}", sdb.block_id),
            }
        })
    }

    fn find_sdb(&self, block_id: BlockId) -> Option<StoredDataBlock> {
        let store = self.lock();
        store
            .placements
            .get(&block_id)?
            .iter()
            .find(|s| s.storage_url == self.url)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_core::format::Record;

    fn rec(v: i64) -> Record {
        let mut m = serde_json::Map::new();
        m.insert("n".to_string(), serde_json::json!(v));
        m
    }

    #[test]
    fn round_trips_records() {
        let storage = InMemoryStorage::new("mem://local");
        let (block, sdb) = storage
            .create_block_from_records(vec![rec(1), rec(2)], SchemaRef::Any, Utc::now())
            .unwrap();
        assert_eq!(storage.find_sdb(block.id), Some(sdb.clone()));
        assert_eq!(storage.read_records(&sdb).unwrap().len(), 2);
    }

    #[test]
    fn convert_lowest_cost_is_idempotent() {
        let local = InMemoryStorage::new("mem://local");
        let target = local.sibling("mem://target");
        let (block, sdb) = local
            .create_block_from_records(vec![rec(1)], SchemaRef::Any, Utc::now())
            .unwrap();
        let placed_a = local.convert_lowest_cost(&sdb, target.url(), &target.natural_format()).unwrap();
        let placed_b = local.convert_lowest_cost(&sdb, target.url(), &target.natural_format()).unwrap();
        assert_eq!(placed_a.id, placed_b.id);
        assert_eq!(target.find_sdb(block.id), Some(placed_a));
    }
}
