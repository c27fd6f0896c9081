//! End-to-end scenarios over `ExecutionManager`/`Worker`/`NodeInterfaceManager`,
//! backed by `pipeflow-mem`'s in-memory collaborators.
//!
//! Grounded on `original_source/tests/test_execution.py` (`test_worker`,
//! `test_worker_output`, `test_non_terminating_pipe`): each scenario here
//! builds a tiny graph, drives it through `execute`, and inspects the
//! lineage log the same way those fixtures inspect `PipeLog`/`DataBlockLog`
//! counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use pipeflow_core::annotation::RawParameter;
use pipeflow_core::block::DataBlock;
use pipeflow_core::collaborator::{Environment, LogStore, LogTransaction, Storage};
use pipeflow_core::context::{Runtime, RuntimeClass, SimpleRuntime};
use pipeflow_core::error::{CoreError, CoreResult};
use pipeflow_core::format::{Record, RecordsList, VecRecordsGenerator};
use pipeflow_core::interface::PipeInterface;
use pipeflow_core::log::{DataBlockLog, Direction, PipeLog};
use pipeflow_core::managed::ManagedBlock;
use pipeflow_core::node::Node;
use pipeflow_core::output::PipeOutput;
use pipeflow_core::pipe::{Pipe, PipeContext, PipeDefinition};
use pipeflow_core::schema::SchemaRef;

use pipeflow_exec::execution::{ExecutionContext, ExecutionManager};

use pipeflow_mem::{InMemoryEnvironment, InMemoryLogStore, InMemoryStorage};

fn rec(pairs: &[(&str, serde_json::Value)]) -> Record {
    let mut m = serde_json::Map::new();
    for (k, v) in pairs {
        m.insert(k.to_string(), v.clone());
    }
    m
}

fn harness(
    nodes: Vec<Node>,
    pipes: Vec<Pipe>,
) -> (ExecutionContext, Arc<InMemoryEnvironment>, Arc<InMemoryLogStore>, Arc<InMemoryStorage>) {
    let mut env = InMemoryEnvironment::new();
    for pipe in pipes {
        env.register_pipe(pipe);
    }
    for node in nodes {
        env.register_node(node);
    }
    let env = Arc::new(env);

    let log_store = Arc::new(InMemoryLogStore::new());
    let local_memory = Arc::new(InMemoryStorage::new("mem://local"));
    let target = Arc::new(local_memory.sibling("mem://target"));
    let runtimes: Vec<Arc<dyn Runtime>> = vec![Arc::new(SimpleRuntime::local("local"))];

    let env_dyn: Arc<dyn Environment> = env.clone();
    let log_store_dyn: Arc<dyn LogStore> = log_store.clone();
    let target_dyn: Arc<dyn Storage> = target.clone();
    let local_memory_dyn: Arc<dyn Storage> = local_memory.clone();

    let ctx = ExecutionContext::new(env_dyn, log_store_dyn, vec![target_dyn.clone()], runtimes, local_memory_dyn)
        .with_target_storage(target_dyn);

    (ctx, env, log_store, target)
}

/// Directly stage a node's prior OUTPUT, bypassing a real invocation — used
/// to set up binding scenarios (e.g. a self-ref slot's history) without
/// driving a whole extra run.
fn seed_output(
    log_store: &InMemoryLogStore,
    storage: &InMemoryStorage,
    node_key: &str,
    schema: SchemaRef,
    records: RecordsList,
) -> DataBlock {
    let (block, sdb) = storage.create_block_from_records(records, schema, Utc::now()).unwrap();
    let mut txn = log_store.begin();
    let pipe_log = PipeLog::start(node_key, "seed", "local", json!({}), json!({}), Utc::now());
    let pipe_log_id = pipe_log.id;
    txn.add_pipe_log(pipe_log);
    txn.add_block(block.clone());
    txn.add_stored_block(sdb);
    txn.add_data_block_log(DataBlockLog::new(pipe_log_id, block.id, Direction::Output, Utc::now()));
    txn.commit().unwrap();
    block
}

fn source_pipe(key: &str, schema: &str, records_fn: impl Fn() -> RecordsList + Send + Sync + 'static) -> Pipe {
    let return_annotation = format!("RecordsList[{schema}]");
    let interface = PipeInterface::from_signature(&[], Some(return_annotation.as_str())).unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, _inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        Ok(PipeOutput::RecordsList(records_fn()))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

/// A source pipe whose output changes on every invocation, standing in for
/// polling a changing upstream feed.
fn counting_source_pipe(key: &str, schema: &str) -> Pipe {
    let counter = Arc::new(Mutex::new(0i64));
    source_pipe(key, schema, move || {
        let mut c = counter.lock().expect("counter mutex poisoned");
        *c += 1;
        vec![rec(&[("seq", json!(*c))])]
    })
}

fn failing_source_pipe(key: &str) -> Pipe {
    let interface = PipeInterface::from_signature(&[], Some("RecordsList[Any]")).unwrap();
    let node_key = key.to_string();
    let callable = move |_ctx: Option<&dyn PipeContext>, _inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        Err(CoreError::PipeFailure {
            node_key: node_key.clone(),
            message: "boom".to_string(),
        })
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

fn sink_pipe(key: &str, schema: &str) -> Pipe {
    let interface = PipeInterface::from_signature(&[RawParameter::new("input", format!("DataBlock[{schema}]"))], None).unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, _inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        Ok(PipeOutput::None)
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

fn passthrough_transform_pipe(key: &str, in_schema: &str, out_schema: &str) -> Pipe {
    let return_annotation = format!("RecordsList[{out_schema}]");
    let interface = PipeInterface::from_signature(
        &[RawParameter::new("input", format!("DataBlock[{in_schema}]"))],
        Some(return_annotation.as_str()),
    )
    .unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let input = inputs.get("input").expect("input slot bound by the interface manager");
        Ok(PipeOutput::RecordsList(input.as_records()?))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

/// `(this: Optional[DataBlock[S]], new: DataBlock[S]) -> RecordsList[S]`:
/// merges its own prior output with whatever new block arrived.
fn accumulator_pipe(key: &str, schema: &str) -> Pipe {
    let return_annotation = format!("RecordsList[{schema}]");
    let interface = PipeInterface::from_signature(
        &[
            RawParameter::new("this", format!("DataBlock[{schema}]")),
            RawParameter::new("new", format!("DataBlock[{schema}]")),
        ],
        Some(return_annotation.as_str()),
    )
    .unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let mut combined = Vec::new();
        if let Some(this) = inputs.get("this") {
            combined.extend(this.as_records()?);
        }
        let new = inputs.get("new").expect("new is a required slot");
        combined.extend(new.as_records()?);
        Ok(PipeOutput::RecordsList(combined))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

/// `(this: Optional[DataBlock[T]], new: DataBlock[T]) -> DataBlock[T]`: the
/// same generic label on both slots, used to exercise generic coherence.
fn coherence_pipe(key: &str) -> Pipe {
    let interface = PipeInterface::from_signature(
        &[RawParameter::new("this", "DataBlock[T]"), RawParameter::new("new", "DataBlock[T]")],
        Some("DataBlock[T]"),
    )
    .unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let new = inputs.get("new").expect("new is a required slot");
        Ok(PipeOutput::Block(new.block().clone()))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

fn dataset_reader_pipe(key: &str, schema: &str) -> Pipe {
    let interface = PipeInterface::from_signature(
        &[RawParameter::new("history", format!("DataSet[{schema}]"))],
        Some("RecordsList[Any]"),
    )
    .unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        let history = inputs.get("history").expect("history is a required slot");
        Ok(PipeOutput::RecordsList(vec![rec(&[(
            "seen_block",
            json!(history.block().id.to_string()),
        )])]))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

fn empty_generator_pipe(key: &str) -> Pipe {
    let interface = PipeInterface::from_signature(&[], Some("RecordsListGenerator[Any]")).unwrap();
    let callable = move |_ctx: Option<&dyn PipeContext>, _inputs: HashMap<String, ManagedBlock>| -> CoreResult<PipeOutput> {
        Ok(PipeOutput::RecordsGenerator(Box::new(VecRecordsGenerator::new(vec![]))))
    };
    Pipe::new(key, interface).with_definition(RuntimeClass::Local, PipeDefinition::Callable(Arc::new(callable)))
}

#[test]
fn scenario_a_source_pipe_runs_once_and_logs_output() {
    let src = source_pipe("literal_src", "Reading", || {
        vec![rec(&[("f1", json!("2"))]), rec(&[("f2", json!(3))])]
    });
    let node = Node::new("src", "literal_src");
    let (ctx, _env, log_store, target) = harness(vec![node.clone()], vec![src]);

    let manager = ExecutionManager::new(ctx);
    let block = manager.execute(&node, true).unwrap().expect("a source pipe always produces a block");
    assert_eq!(block.realized_schema, SchemaRef::Named("Reading".to_string()));

    let logged = log_store.outputs_for_node("src");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].id, block.id);

    let records = target.read_records(&target.find_sdb(block.id).unwrap()).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn scenario_b_required_input_exhausted_before_upstream_has_output() {
    let src = source_pipe("literal_src_b", "Reading", || vec![rec(&[("f1", json!(1))])]);
    let sink = sink_pipe("sink_pipe", "Reading");
    let src_node = Node::new("src", "literal_src_b");
    let sink_node = Node::new("sink", "sink_pipe").with_input("input", "src");
    let (ctx, _env, log_store, _target) = harness(vec![src_node, sink_node.clone()], vec![src, sink]);

    let manager = ExecutionManager::new(ctx);
    let out = manager.execute(&sink_node, true).unwrap();
    assert!(out.is_none(), "the required slot has nothing to bind yet");
    assert!(log_store.outputs_for_node("sink").is_empty());
}

#[test]
fn scenario_c_one_block_flow_and_no_reprocessing_on_rerun() {
    let src = source_pipe("literal_src_c", "Raw", || vec![rec(&[("n", json!(1))])]);
    let xform = passthrough_transform_pipe("xform_pipe", "Raw", "Raw");
    let src_node = Node::new("src", "literal_src_c");
    let xform_node = Node::new("xform", "xform_pipe").with_input("input", "src");
    let (ctx, _env, log_store, _target) = harness(vec![src_node.clone(), xform_node.clone()], vec![src, xform]);

    let manager = ExecutionManager::new(ctx);
    let source_block = manager.execute(&src_node, true).unwrap().unwrap();
    assert!(!log_store.is_logged_input("xform", source_block.id));

    manager.execute(&xform_node, true).unwrap().expect("one block to transform");
    assert_eq!(log_store.outputs_for_node("xform").len(), 1);
    assert!(log_store.is_logged_input("xform", source_block.id));

    let rerun = manager.execute(&xform_node, true).unwrap();
    assert!(rerun.is_none(), "no new input arrived, so the pipe does not run again");
    assert_eq!(log_store.outputs_for_node("xform").len(), 1, "rerun must not log a second output");
}

#[test]
fn scenario_d_pipe_failure_surfaces_and_produces_no_output() {
    let boom = failing_source_pipe("boom_pipe");
    let node = Node::new("boom", "boom_pipe");
    let (ctx, _env, log_store, _target) = harness(vec![node.clone()], vec![boom]);

    let manager = ExecutionManager::new(ctx);
    let err = manager.execute(&node, true).unwrap_err();
    assert!(matches!(err, CoreError::PipeFailure { .. }));
    assert!(log_store.outputs_for_node("boom").is_empty());
}

#[test]
fn scenario_e_self_ref_accumulator_merges_across_iterations() {
    let src = counting_source_pipe("counting_src", "Tick");
    let acc = accumulator_pipe("acc_pipe", "Tick");
    let src_node = Node::new("src", "counting_src");
    let acc_node = Node::new("acc", "acc_pipe").with_input("new", "src");
    let (ctx, _env, log_store, target) = harness(vec![src_node.clone(), acc_node.clone()], vec![src, acc]);

    let manager = ExecutionManager::new(ctx);

    manager.execute(&src_node, false).unwrap();
    let first = manager.execute(&acc_node, true).unwrap().expect("first run produces output");
    let first_records = target.read_records(&target.find_sdb(first.id).unwrap()).unwrap();
    assert_eq!(first_records.len(), 1, "nothing to merge on the very first run");

    manager.execute(&src_node, false).unwrap();
    let second = manager.execute(&acc_node, true).unwrap().expect("second run produces output");
    let second_records = target.read_records(&target.find_sdb(second.id).unwrap()).unwrap();
    assert_eq!(second_records.len(), 2, "second run merges its own prior output with the new block");

    assert_eq!(log_store.outputs_for_node("acc").len(), 2);
}

#[test]
fn scenario_f_invalid_signature_rejects_two_uncorrelated_data_blocks() {
    let params = [RawParameter::new("a", "DataBlock[T1]"), RawParameter::new("b", "DataBlock[T2]")];
    let result = PipeInterface::from_signature(&params, Some("DataBlock[T3]"));
    assert!(matches!(result, Err(CoreError::InvalidSignature(_))));
}

#[test]
fn scenario_g_dataset_slot_only_reruns_on_a_new_most_recent_block() {
    let src = counting_source_pipe("counting_src_g", "Event");
    let reader = dataset_reader_pipe("dataset_reader", "Event");
    let src_node = Node::new("src", "counting_src_g");
    let reader_node = Node::new("reader", "dataset_reader").with_input("history", "src");
    let (ctx, _env, log_store, _target) = harness(vec![src_node.clone(), reader_node.clone()], vec![src, reader]);

    let manager = ExecutionManager::new(ctx);

    assert!(manager.execute(&reader_node, true).unwrap().is_none(), "no upstream output yet");

    manager.execute(&src_node, false).unwrap();
    assert!(manager.execute(&reader_node, true).unwrap().is_some());
    assert_eq!(log_store.outputs_for_node("reader").len(), 1);

    let rerun = manager.execute(&reader_node, true).unwrap();
    assert!(rerun.is_none(), "the most recent block is still the one already consumed");
    assert_eq!(log_store.outputs_for_node("reader").len(), 1);

    manager.execute(&src_node, false).unwrap();
    assert!(manager.execute(&reader_node, true).unwrap().is_some(), "a new most-recent block makes the slot fresh again");
    assert_eq!(log_store.outputs_for_node("reader").len(), 2);
}

#[test]
fn scenario_h_generic_coherence_conflict_between_self_ref_and_new_input() {
    let coh = coherence_pipe("coherence_pipe");
    let coh_node = Node::new("coh", "coherence_pipe").with_input("new", "upstream");
    let upstream_node = Node::new("upstream", "unused_upstream_pipe");
    let (ctx, _env, log_store, target) = harness(vec![coh_node.clone(), upstream_node], vec![coh]);

    seed_output(&log_store, &target, "coh", SchemaRef::Named("A".to_string()), vec![rec(&[("x", json!(1))])]);
    seed_output(&log_store, &target, "upstream", SchemaRef::Named("B".to_string()), vec![rec(&[("y", json!(2))])]);

    let manager = ExecutionManager::new(ctx);
    let err = manager.execute(&coh_node, false).unwrap_err();
    assert!(
        matches!(err, CoreError::InvalidInputAssignment(_)),
        "generic `T` cannot resolve to both `A` (from `this`) and `B` (from `new`)"
    );
}

#[test]
fn scenario_i_empty_generator_output_is_treated_as_no_output() {
    let gen_pipe = empty_generator_pipe("empty_gen_pipe");
    let node = Node::new("empty_gen", "empty_gen_pipe");
    let (ctx, _env, log_store, _target) = harness(vec![node.clone()], vec![gen_pipe]);

    let manager = ExecutionManager::new(ctx);
    let out = manager.execute(&node, true).unwrap();
    assert!(out.is_none());
    assert!(log_store.outputs_for_node("empty_gen").is_empty());
}
