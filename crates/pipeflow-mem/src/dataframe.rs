//! `ArrowDataFrame` — the concrete `DataFramePayload` this reference
//! implementation ships, backed by an Arrow `RecordBatch`. Interpreting
//! columns and rows is this crate's concern (spec §4.1's `DataFrame`
//! format class leaves the payload shape to the storage collaborator).

use arrow_array::RecordBatch;
use pipeflow_core::format::DataFramePayload;

#[derive(Debug, Clone)]
pub struct ArrowDataFrame(pub RecordBatch);

impl ArrowDataFrame {
    pub fn new(batch: RecordBatch) -> Self {
        Self(batch)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.0
    }
}

impl DataFramePayload for ArrowDataFrame {
    fn is_empty(&self) -> bool {
        self.0.num_rows() == 0
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
