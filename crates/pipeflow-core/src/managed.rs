//! `ManagedBlock` — the handle a pipe invocation actually receives for each
//! bound input slot: a `DataBlock` wrapped so it lazily materializes
//! records in the pipe's preferred format (spec §4.5 step 2).

use std::sync::Arc;

use crate::block::DataBlock;
use crate::collaborator::Storage;
use crate::error::{CoreError, CoreResult};
use crate::format::RecordsList;

#[derive(Clone)]
pub struct ManagedBlock {
    block: DataBlock,
    storage: Arc<dyn Storage>,
}

impl ManagedBlock {
    pub fn new(block: DataBlock, storage: Arc<dyn Storage>) -> Self {
        Self { block, storage }
    }

    pub fn block(&self) -> &DataBlock {
        &self.block
    }

    /// Materialize this block's records on demand. Pipes that only need
    /// metadata (schema, id) never pay for this.
    pub fn as_records(&self) -> CoreResult<RecordsList> {
        let sdb = self.storage.find_sdb(self.block.id).ok_or_else(|| {
            CoreError::UnsupportedOutputType {
                pipe_key: "<managed-block>".to_string(),
                detail: format!("no stored materialization found for block {}", self.block.id),
            }
        })?;
        self.storage.read_records(&sdb)
    }
}

impl std::fmt::Debug for ManagedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBlock").field("block", &self.block).finish()
    }
}
