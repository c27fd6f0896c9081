//! # pipeflow-exec
//!
//! Interface binding, execution manager, and worker for the pipeflow
//! execution engine (spec §4.2-§4.5): given a `Node` in an `ExecutionContext`,
//! discover concrete input blocks, invoke the node's pipe, conform its
//! output, and log the invocation's lineage.
//!
//! This crate is generic over `pipeflow_core`'s collaborator traits
//! (`Environment`, `Storage`, `LogStore`, `StreamSource`) and never depends
//! on `pipeflow-mem`'s concrete in-memory implementation.

pub mod bound;
pub mod execution;
pub mod interface_manager;
pub mod worker;

pub use bound::{BoundInterface, NodeInput};
pub use execution::{Executable, ExecutionContext, ExecutionManager};
pub use interface_manager::NodeInterfaceManager;
pub use worker::{PipeContext, Worker};
