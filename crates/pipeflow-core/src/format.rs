//! Format classes: the closed variant a pipe annotation's `F` resolves to,
//! and the runtime payload types that flow through pipe invocations.
//!
//! Per the design notes (§9), polymorphism here is a closed tagged union
//! rather than a class hierarchy: `NodeInterfaceManager` and the Worker's
//! output conformance both switch on `FormatClass`.

use std::fmt;

/// One JSON-object-shaped record, the unit `RecordsList` is built from.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A batch of records in the simplest supported in-memory shape.
pub type RecordsList = Vec<Record>;

/// The valid data format classes a pipe parameter or return type may
/// declare (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FormatClass {
    DataBlock,
    DataSet,
    DataFrame,
    RecordsList,
    RecordsListGenerator,
    DataFrameGenerator,
    DatabaseTableRef,
}

impl FormatClass {
    pub const ALL: &'static [FormatClass] = &[
        FormatClass::DataBlock,
        FormatClass::DataSet,
        FormatClass::DataFrame,
        FormatClass::RecordsList,
        FormatClass::RecordsListGenerator,
        FormatClass::DataFrameGenerator,
        FormatClass::DatabaseTableRef,
    ];

    /// Parse a format class tag as it appears as `F` in `Optional[F[S]]`.
    /// Returns `None` (not an error) for tags outside the valid set, so the
    /// caller can apply the `context` special-case (spec §4.1).
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "DataBlock" => FormatClass::DataBlock,
            "DataSet" => FormatClass::DataSet,
            "DataFrame" => FormatClass::DataFrame,
            "RecordsList" => FormatClass::RecordsList,
            "RecordsListGenerator" => FormatClass::RecordsListGenerator,
            "DataFrameGenerator" => FormatClass::DataFrameGenerator,
            "DatabaseTableRef" => FormatClass::DatabaseTableRef,
            _ => return None,
        })
    }

    pub fn is_generator(&self) -> bool {
        matches!(
            self,
            FormatClass::RecordsListGenerator | FormatClass::DataFrameGenerator
        )
    }
}

impl fmt::Display for FormatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatClass::DataBlock => "DataBlock",
            FormatClass::DataSet => "DataSet",
            FormatClass::DataFrame => "DataFrame",
            FormatClass::RecordsList => "RecordsList",
            FormatClass::RecordsListGenerator => "RecordsListGenerator",
            FormatClass::DataFrameGenerator => "DataFrameGenerator",
            FormatClass::DatabaseTableRef => "DatabaseTableRef",
        };
        write!(f, "{s}")
    }
}

/// An opaque in-memory dataframe payload. The engine only needs to know
/// whether a freshly-produced one is empty (to detect an empty generator's
/// first element per §4.5 step 4); interpreting columns and rows is a
/// concern of the storage collaborator (out of scope here). `as_any` lets a
/// concrete `Storage` downcast back to its own payload representation
/// (e.g. `pipeflow-mem`'s Arrow-backed dataframe) without this crate
/// needing to know that representation.
pub trait DataFramePayload: fmt::Debug + Send + 'static {
    fn is_empty(&self) -> bool;
    fn as_any(&self) -> &dyn std::any::Any;
}

pub type BoxedDataFrame = Box<dyn DataFramePayload>;

/// A reference to an external database table, for the `DatabaseTableRef`
/// format class (SQL-runtime specialization is out of scope; this is just
/// the handle a pipe may declare and pass through).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseTableRef {
    pub table_name: String,
    pub runtime_url: String,
}

/// A lazily-produced sequence of `RecordsList` chunks.
pub trait RecordsGenerator: Send {
    fn next_chunk(&mut self) -> Option<RecordsList>;
}

/// A lazily-produced sequence of dataframe chunks.
pub trait DataFrameGeneratorTrait: Send {
    fn next_chunk(&mut self) -> Option<BoxedDataFrame>;
}

/// Materialize a `Vec<RecordsList>` (e.g. built in a test) into a
/// `RecordsGenerator`, matching how the teacher's test fixtures build
/// simple iterator-backed operators.
pub struct VecRecordsGenerator {
    chunks: std::vec::IntoIter<RecordsList>,
}

impl VecRecordsGenerator {
    pub fn new(chunks: Vec<RecordsList>) -> Self {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

impl RecordsGenerator for VecRecordsGenerator {
    fn next_chunk(&mut self) -> Option<RecordsList> {
        self.chunks.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_valid_classes() {
        for fc in FormatClass::ALL {
            let s = fc.to_string();
            assert_eq!(FormatClass::parse(&s), Some(*fc));
        }
    }

    #[test]
    fn rejects_unknown_class() {
        assert_eq!(FormatClass::parse("Frobnicator"), None);
    }
}
