//! `Pipe` — a named, versioned registration that may carry more than one
//! `PipeDefinition`, keyed by `RuntimeClass` (spec §4.7, recovered from
//! `basis.core.data_function.DataFunctionDefinition` / `dags.core.pipe.Pipe`).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::context::RuntimeClass;
use crate::error::CoreResult;
use crate::interface::PipeInterface;
use crate::managed::ManagedBlock;
use crate::output::PipeOutput;

/// Shortcut access a pipe callable gets to its own invocation context.
/// Kept as a narrow trait (rather than a concrete struct) so this crate
/// never has to know about `pipeflow-exec`'s `ExecutionContext`/`Worker`
/// types — the concrete `PipeContext` with the full
/// `execution_context`/`worker`/`executable` fields described in spec §6
/// lives in `pipeflow-exec` and implements this trait.
pub trait PipeContext: Send + Sync {
    /// Shortcut to `executable.configuration[key]`.
    fn config(&self, key: &str) -> Option<Value>;
}

/// A pipe callable: `(context?, **named_blocks) -> PipeOutput` (spec §6).
pub trait PipeCallable: Send + Sync {
    fn invoke(
        &self,
        context: Option<&dyn PipeContext>,
        inputs: HashMap<String, ManagedBlock>,
    ) -> CoreResult<PipeOutput>;
}

/// Blanket impl so a plain closure can serve as a `PipeCallable` without
/// boilerplate, matching how the teacher's test fixtures define pipes as
/// bare functions.
impl<F> PipeCallable for F
where
    F: Fn(Option<&dyn PipeContext>, HashMap<String, ManagedBlock>) -> CoreResult<PipeOutput> + Send + Sync,
{
    fn invoke(
        &self,
        context: Option<&dyn PipeContext>,
        inputs: HashMap<String, ManagedBlock>,
    ) -> CoreResult<PipeOutput> {
        self(context, inputs)
    }
}

/// One runtime-class-specific implementation of a pipe.
pub enum PipeDefinition {
    Callable(Arc<dyn PipeCallable>),
    /// A SQL template string; execution is the SQL-runtime specialization,
    /// out of scope here (spec §1, §6).
    Sql(String),
}

impl std::fmt::Debug for PipeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeDefinition::Callable(_) => write!(f, "PipeDefinition::Callable(..)"),
            PipeDefinition::Sql(s) => write!(f, "PipeDefinition::Sql({s:?})"),
        }
    }
}

/// A named, versioned pipe registration.
#[derive(Debug, Clone)]
pub struct Pipe {
    pub key: String,
    pub interface: PipeInterface,
    pub compatible_runtimes: HashSet<RuntimeClass>,
    definitions: HashMap<RuntimeClass, Arc<PipeDefinition>>,
}

impl Pipe {
    pub fn new(key: impl Into<String>, interface: PipeInterface) -> Self {
        Self {
            key: key.into(),
            interface,
            compatible_runtimes: HashSet::new(),
            definitions: HashMap::new(),
        }
    }

    pub fn with_definition(mut self, class: RuntimeClass, definition: PipeDefinition) -> Self {
        self.compatible_runtimes.insert(class);
        self.definitions.insert(class, Arc::new(definition));
        self
    }

    pub fn get_definition(&self, class: RuntimeClass) -> Option<Arc<PipeDefinition>> {
        self.definitions.get(&class).cloned()
    }
}
