//! # pipeflow-cli
//!
//! Graph loader and runner for the pipeflow execution engine. Loads a YAML
//! `GraphSpec` (SPEC_FULL.md §4.8), resolves each node's pipe against a
//! small built-in registry, and drives every node to exhaustion in
//! declaration order against an in-memory `pipeflow-mem` environment.
//!
//! Module loading and general-purpose pipe resolution are out of scope
//! (spec §1) — this CLI only demonstrates the run loop end to end with a
//! couple of built-in pipes, grounded in the teacher's `rde-cli` for the
//! `clap`/`tracing-subscriber`/`serde_yaml` wiring.

mod pipes;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeflow_core::error::CoreError;
use pipeflow_core::context::{Runtime, RuntimeClass, SimpleRuntime};
use pipeflow_exec::execution::{ExecutionContext, ExecutionManager};
use pipeflow_mem::{GraphSpec, InMemoryEnvironment, InMemoryLogStore, InMemoryStorage};

/// Run a pipeflow graph to exhaustion.
#[derive(Parser, Debug)]
#[command(name = "pipeflow-cli")]
#[command(about = "Run a pipeflow DAG of pipe nodes from a YAML graph spec")]
struct Args {
    /// Path to the graph YAML configuration file.
    #[arg(short, long)]
    graph: PathBuf,

    /// Storage URL the run loop materializes pipe outputs onto.
    #[arg(long, default_value = "mem://target")]
    target_storage: String,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            exit_code_for(&e)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(&args.graph)?;
    let spec = GraphSpec::from_yaml(&yaml)?;
    if let Err((node, slot, upstream)) = spec.check_topological_order() {
        anyhow::bail!(
            "node `{node}` declares input `{slot}` from `{upstream}`, which is not \
             declared earlier in the graph"
        );
    }
    info!(graph = %spec.name, nodes = spec.nodes.len(), "loaded graph");

    let mut env = InMemoryEnvironment::new();
    for (_, pipe) in pipes::builtin_pipes() {
        env.register_pipe(pipe);
    }
    for node_spec in &spec.nodes {
        env.register_node(node_spec.to_node());
    }
    let env: Arc<dyn pipeflow_core::collaborator::Environment> = Arc::new(env);

    let local_memory = Arc::new(InMemoryStorage::new("mem://local"));
    let target: Arc<dyn pipeflow_core::collaborator::Storage> =
        Arc::new(local_memory.sibling(&args.target_storage));
    let log_store: Arc<dyn pipeflow_core::collaborator::LogStore> = Arc::new(InMemoryLogStore::new());
    let runtimes: Vec<Arc<dyn Runtime>> = vec![Arc::new(SimpleRuntime::new(RuntimeClass::Local, "local"))];

    let ctx = ExecutionContext::new(env.clone(), log_store, vec![target.clone()], runtimes, local_memory)
        .with_target_storage(target);

    for node_spec in &spec.nodes {
        let node = env.get_node(&node_spec.key)?;
        let manager = ExecutionManager::new(ctx.clone());
        match manager.execute(&node, true) {
            Ok(Some(block)) => {
                info!(node = %node.key, block = %block.id, schema = %block.realized_schema, "produced output");
            }
            Ok(None) => {
                info!(node = %node.key, "exhausted with no new output");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Map a `CoreError` to a process exit code (SPEC_FULL.md §6): `0` on
/// normal completion including exhaustion, non-zero for everything else.
/// `InputExhausted` never reaches here — `ExecutionManager::execute`
/// recovers it internally.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let Some(core_err) = err.downcast_ref::<CoreError>() else {
        return ExitCode::from(1);
    };
    let code = match core_err {
        CoreError::InvalidSignature(_) => 2,
        CoreError::InvalidInputAssignment(_) => 3,
        CoreError::NoCompatibleRuntime(_) => 4,
        CoreError::NoSuchDefinition { .. } => 5,
        CoreError::MissingTargetStorage(_) => 6,
        CoreError::UnsupportedOutputType { .. } => 7,
        CoreError::PipeFailure { .. } => 8,
        CoreError::InputExhausted(_) => 0,
    };
    ExitCode::from(code)
}
