//! `PipeOutput` — the values a pipe callable may return, per the
//! conformance table in spec §4.5.

use crate::block::{DataBlock, DataSet, StoredDataBlock};
use crate::format::{BoxedDataFrame, RecordsGenerator, RecordsList};

/// What a pipe invocation returned. `Worker::conform_output` switches on
/// this to decide how to turn it into a logged `DataBlock`.
pub enum PipeOutput {
    /// No output this iteration.
    None,
    /// A metadata value the pipe produced directly (e.g. it fetched an
    /// existing block from the environment) — merged in as-is.
    Block(DataBlock),
    Stored(StoredDataBlock),
    DataSet(DataSet),
    /// A concrete in-memory payload matching the declared output format
    /// class.
    RecordsList(RecordsList),
    DataFrame(BoxedDataFrame),
    /// A lazily-produced sequence, wrapped in a reusable generator so the
    /// Worker can peek at the first element without losing it (§4.5 step
    /// 4).
    RecordsGenerator(Box<dyn RecordsGenerator>),
    DataFrameGenerator(Box<dyn crate::format::DataFrameGeneratorTrait>),
}

impl std::fmt::Debug for PipeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeOutput::None => write!(f, "PipeOutput::None"),
            PipeOutput::Block(b) => write!(f, "PipeOutput::Block({:?})", b.id),
            PipeOutput::Stored(s) => write!(f, "PipeOutput::Stored({:?})", s.id),
            PipeOutput::DataSet(d) => write!(f, "PipeOutput::DataSet({:?})", d.name),
            PipeOutput::RecordsList(r) => write!(f, "PipeOutput::RecordsList(len={})", r.len()),
            PipeOutput::DataFrame(_) => write!(f, "PipeOutput::DataFrame(..)"),
            PipeOutput::RecordsGenerator(_) => write!(f, "PipeOutput::RecordsGenerator(..)"),
            PipeOutput::DataFrameGenerator(_) => write!(f, "PipeOutput::DataFrameGenerator(..)"),
        }
    }
}
