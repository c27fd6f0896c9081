//! # pipeflow-core
//!
//! Data model, annotation parser, and collaborator traits for the pipeflow
//! execution engine: a data-processing runtime that executes a DAG of
//! user-defined transformation functions ("pipes") over typed, immutable
//! batches of records ("data blocks").
//!
//! This crate defines the *vocabulary* — schemas, blocks, interfaces,
//! pipes, errors, and the `Environment`/`Storage`/`LogStore`/`StreamSource`
//! collaborator traits the engine is generic over. The engine itself
//! (interface binding, the execution manager, the worker) lives in
//! `pipeflow-exec`; a concrete in-memory implementation of the
//! collaborator traits lives in `pipeflow-mem`.

pub mod annotation;
pub mod block;
pub mod collaborator;
pub mod context;
pub mod error;
pub mod format;
pub mod interface;
pub mod log;
pub mod managed;
pub mod node;
pub mod output;
pub mod pipe;
pub mod schema;

pub use annotation::{AnnotationParser, PipeAnnotation, RawParameter};
pub use block::{BlockId, DataBlock, DataSet, StoredDataBlock};
pub use collaborator::{Environment, LogStore, LogTransaction, Storage, StreamSource};
pub use context::{Runtime, RuntimeClass, SimpleRuntime};
pub use error::{CoreError, CoreResult, PipeError};
pub use format::{BoxedDataFrame, DataFramePayload, FormatClass, Record, RecordsList};
pub use interface::{PipeInterface, RawInputs};
pub use log::{DataBlockLog, Direction, NodeState, PipeLog};
pub use managed::ManagedBlock;
pub use node::{DeclaredInputs, Node, NodeKey};
pub use output::PipeOutput;
pub use pipe::{Pipe, PipeCallable, PipeContext, PipeDefinition};
pub use schema::SchemaRef;
