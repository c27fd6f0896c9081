//! `ExecutionContext` and `ExecutionManager` — the outer driver that
//! selects a runtime and repeatedly binds/dispatches a node until inputs
//! are exhausted or the pipe is a source (spec §4.4).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use pipeflow_core::{
    CoreError, CoreResult, DataBlock, Environment, LogStore, Node, PipeDefinition, Runtime, Storage,
};

use crate::bound::BoundInterface;
use crate::interface_manager::NodeInterfaceManager;
use crate::worker::Worker;

/// Everything one `execute` call needs: the environment, the lineage log,
/// the storage matrix, and (once selected) the current runtime. Mirrors
/// the source's `ExecutionContext` dataclass.
#[derive(Clone)]
pub struct ExecutionContext {
    pub env: Arc<dyn Environment>,
    pub log_store: Arc<dyn LogStore>,
    pub storages: Vec<Arc<dyn Storage>>,
    pub runtimes: Vec<Arc<dyn Runtime>>,
    pub target_storage: Option<Arc<dyn Storage>>,
    pub local_memory_storage: Arc<dyn Storage>,
    pub current_runtime: Option<Arc<dyn Runtime>>,
}

impl ExecutionContext {
    pub fn new(
        env: Arc<dyn Environment>,
        log_store: Arc<dyn LogStore>,
        storages: Vec<Arc<dyn Storage>>,
        runtimes: Vec<Arc<dyn Runtime>>,
        local_memory_storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            env,
            log_store,
            storages,
            runtimes,
            target_storage: None,
            local_memory_storage,
            current_runtime: None,
        }
    }

    pub fn with_target_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.target_storage = Some(storage);
        self
    }

    fn with_runtime(&self, runtime: Arc<dyn Runtime>) -> Self {
        let mut clone = self.clone();
        clone.current_runtime = Some(runtime);
        clone
    }

    /// Storages a candidate block may be filtered to: the context's
    /// storages plus local memory (spec §4.3 step 3).
    pub fn all_storage_urls(&self) -> Vec<String> {
        let mut urls = vec![self.local_memory_storage.url().to_string()];
        urls.extend(self.storages.iter().map(|s| s.url().to_string()));
        urls
    }
}

/// The fully-resolved description of one pipe invocation, handed to the
/// `Worker`.
pub struct Executable {
    pub node_key: String,
    pub pipe_key: String,
    pub definition: Arc<PipeDefinition>,
    pub bound: BoundInterface,
    pub configuration: Value,
}

pub struct ExecutionManager {
    ctx: ExecutionContext,
}

impl ExecutionManager {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// The first runtime in the context whose class matches one of the
    /// pipe's compatible runtimes.
    fn select_runtime(&self, pipe: &pipeflow_core::Pipe) -> CoreResult<Arc<dyn Runtime>> {
        self.ctx
            .runtimes
            .iter()
            .find(|rt| pipe.compatible_runtimes.contains(&rt.class()))
            .cloned()
            .ok_or_else(|| CoreError::NoCompatibleRuntime(pipe.key.clone()))
    }

    /// Drive `node` to output or to exhaustion. Callers must serialize
    /// concurrent calls for the same node (spec §5) — this method makes no
    /// locking guarantees of its own.
    ///
    /// Composite nodes (pipes whose definition is a subgraph) must already
    /// have been flattened to leaf nodes by the graph layer; this defends
    /// against that invariant being violated by requiring every pipe to
    /// carry a concrete `PipeDefinition` for the selected runtime class.
    pub fn execute(&self, node: &Node, to_exhaustion: bool) -> CoreResult<Option<DataBlock>> {
        let pipe = self.ctx.env.get_pipe(&node.pipe_key)?;
        let runtime = self.select_runtime(&pipe)?;
        let run_ctx = self.ctx.with_runtime(runtime.clone());
        let worker = Worker::new(run_ctx.clone());

        let mut last: Option<DataBlock> = None;
        let mut n_runs = 0u64;
        loop {
            let bound = match NodeInterfaceManager::new(&run_ctx, node, &pipe).bind() {
                Ok(b) => b,
                Err(e) if e.is_input_exhausted() => {
                    debug!(node = %node.key, "input exhausted: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };
            let definition = pipe.get_definition(runtime.class()).ok_or_else(|| {
                CoreError::NoSuchDefinition {
                    pipe_key: pipe.key.clone(),
                    runtime_class: runtime.class(),
                }
            })?;
            let is_source = bound.is_empty_inputs();
            let executable = Executable {
                node_key: node.key.clone(),
                pipe_key: pipe.key.clone(),
                definition,
                bound,
                configuration: node.config.clone(),
            };
            let out = worker.run(node, &executable)?;
            n_runs += 1;
            if out.is_some() {
                last = out;
            }
            if !to_exhaustion || is_source {
                // Source pipes (no declared inputs) run exactly once
                // regardless of `to_exhaustion` (spec §4.4).
                break;
            }
        }
        if n_runs == 0 {
            warn!(node = %node.key, "no unprocessed inputs; node did not run");
        }
        Ok(last)
    }
}
