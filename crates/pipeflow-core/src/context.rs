//! Runtime selection types.
//!
//! A pipe declares the set of runtime classes its definitions support; the
//! execution manager picks the first runtime in the context whose class is
//! compatible (spec §4.4). The SQL-runtime specialization itself is out of
//! scope here — `RuntimeClass::Database` is only ever used to pick between
//! a callable and a SQL-template `PipeDefinition`.

use std::fmt;

/// The class of engine a runtime belongs to. Closed set: this core never
/// runs SQL itself, it only uses the tag to select a `PipeDefinition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RuntimeClass {
    /// An in-process callable runtime (the only one this workspace's
    /// reference implementation actually executes).
    Local,
    /// A SQL database runtime; definitions for it are `PipeDefinition::Sql`.
    Database,
}

impl fmt::Display for RuntimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeClass::Local => write!(f, "local"),
            RuntimeClass::Database => write!(f, "database"),
        }
    }
}

/// A concrete runtime instance available in an execution context.
///
/// Modeled as a trait rather than a struct because the storage/SQL-runtime
/// matrix is out of scope (§1) — callers supply whatever runtime handles
/// their environment has (e.g. one `Local` runtime for an in-memory
/// reference implementation, or a `Database` runtime pointed at a real
/// connection string).
pub trait Runtime: fmt::Debug + Send + Sync {
    fn class(&self) -> RuntimeClass;
    /// Connection string / identifier recorded on `PipeLog::runtime_url`.
    fn url(&self) -> &str;
}

/// A minimal concrete `Runtime`, sufficient for the in-memory reference
/// implementation and for tests that don't need a real database handle.
#[derive(Debug, Clone)]
pub struct SimpleRuntime {
    class: RuntimeClass,
    url: String,
}

impl SimpleRuntime {
    pub fn new(class: RuntimeClass, url: impl Into<String>) -> Self {
        Self {
            class,
            url: url.into(),
        }
    }

    pub fn local(url: impl Into<String>) -> Self {
        Self::new(RuntimeClass::Local, url)
    }
}

impl Runtime for SimpleRuntime {
    fn class(&self) -> RuntimeClass {
        self.class
    }

    fn url(&self) -> &str {
        &self.url
    }
}
