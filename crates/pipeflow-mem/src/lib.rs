//! # pipeflow-mem
//!
//! In-memory reference implementation of `pipeflow-core`'s `Environment`,
//! `Storage`, `LogStore`, and `StreamSource` collaborator traits.
//!
//! This is not a production storage engine (spec §1 keeps those external);
//! it exists to let the exhaustion-driven run loop in `pipeflow-exec` be
//! exercised end to end, backing both `pipeflow-cli` and the scenario tests
//! in `pipeflow-exec`'s test suite (spec §8). Grounded in the teacher's
//! `rde-io` crate for the "concrete impl crate next to the abstract trait
//! crate" shape.

pub mod dataframe;
pub mod environment;
pub mod graph_spec;
pub mod log_store;
pub mod storage;
pub mod stream;

pub use dataframe::ArrowDataFrame;
pub use environment::InMemoryEnvironment;
pub use graph_spec::{GraphSpec, NodeSpec};
pub use log_store::InMemoryLogStore;
pub use storage::{InMemoryStorage, DATAFRAME_FORMAT, RECORDS_FORMAT};
pub use stream::InMemoryStreamSource;
