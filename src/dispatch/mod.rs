//! Command dispatch over layered registries.
//!
//! A request names a tool and carries a JSON payload. The [`Dispatcher`]
//! resolves the tool in the core registry (filtering and queries), then in
//! the enhancement registry (batch operations, transaction groups, analysis),
//! and echoes anything else back as a `noop`.
//!
//! Handlers parse their payload into a typed struct before touching the
//! graph, so malformed payloads fail with a validation error and never reach
//! the engine. The dispatcher is the only place errors and panics are turned
//! into responses.

pub mod enhancements;
pub mod params;
pub mod queries;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::engine::transaction;
use crate::engine::{EngineError, EngineResult, QueryOptions, TransactionGroup};
use crate::model::GraphMut;

/// Per-connection state: the graph, query tunables, the directories exports
/// may write to and the open transaction group, if any.
pub struct Session<G: GraphMut> {
    graph: G,
    options: QueryOptions,
    wrap_reads: bool,
    allowed_paths: Vec<PathBuf>,
    group: Option<TransactionGroup<G::Checkpoint>>,
}

impl<G: GraphMut> Session<G> {
    /// Creates a session with default options. Exports may write under the
    /// current directory only.
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            options: QueryOptions::default(),
            wrap_reads: true,
            allowed_paths: vec![PathBuf::from(".")],
            group: None,
        }
    }

    /// Overrides the query options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets whether reads run inside an immediately committed transaction.
    #[must_use]
    pub fn with_wrapped_reads(mut self, wrap: bool) -> Self {
        self.wrap_reads = wrap;
        self
    }

    /// Replaces the directories exports may write to. An empty list refuses
    /// every export path.
    #[must_use]
    pub fn with_allowed_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.allowed_paths = paths;
        self
    }

    /// Resolves an export destination, refusing anything outside the allowed
    /// directories.
    ///
    /// The file need not exist yet, but its parent directory must.
    ///
    /// # Errors
    ///
    /// Returns an `ExportError` if the path cannot be resolved or lies
    /// outside every allowed directory.
    pub fn export_target(&self, path: &Path) -> EngineResult<PathBuf> {
        let target = if path.exists() {
            path.canonicalize()
                .map_err(|e| EngineError::export(format!("cannot resolve '{}': {e}", path.display())))?
        } else {
            let file_name = path.file_name().ok_or_else(|| {
                EngineError::export(format!("'{}' does not name a file", path.display()))
            })?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let parent = parent.canonicalize().map_err(|e| {
                EngineError::export(format!(
                    "directory '{}' does not exist or is inaccessible: {e}",
                    parent.display()
                ))
            })?;
            parent.join(file_name)
        };

        let allowed = self
            .allowed_paths
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .any(|dir| target.starts_with(dir));
        if allowed {
            Ok(target)
        } else {
            warn!(path = %path.display(), "Export outside allowed directories refused");
            Err(EngineError::export(
                "access denied: path is outside the configured allowed directories",
            ))
        }
    }

    /// The graph.
    pub const fn graph(&self) -> &G {
        &self.graph
    }

    /// Query options in effect.
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Name of the open transaction group.
    pub fn active_group(&self) -> Option<&str> {
        self.group.as_ref().map(TransactionGroup::name)
    }

    /// Runs a read-only query, wrapped in a transaction if configured.
    ///
    /// # Errors
    ///
    /// Returns the query's error or a transaction precondition violation.
    pub fn read<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&G, &QueryOptions) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let options = self.options;
        transaction::read(&mut self.graph, name, self.wrap_reads, |g| f(g, &options))?
    }

    pub(crate) fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub(crate) fn group_mut(&mut self) -> &mut Option<TransactionGroup<G::Checkpoint>> {
        &mut self.group
    }
}

/// A tool implementation.
pub type Handler<G> = fn(&mut Session<G>, &Value) -> EngineResult<Value>;

/// An ordered table of tool name to handler.
pub struct Registry<G: GraphMut> {
    name: &'static str,
    handlers: IndexMap<&'static str, Handler<G>>,
}

impl<G: GraphMut> Registry<G> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: IndexMap::new(),
        }
    }

    /// Adds a tool. A later registration under the same name replaces the
    /// earlier one.
    #[must_use]
    pub fn with(mut self, tool: &'static str, handler: Handler<G>) -> Self {
        self.handlers.insert(tool, handler);
        self
    }

    /// Registry name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Looks up a tool.
    #[must_use]
    pub fn get(&self, tool: &str) -> Option<Handler<G>> {
        self.handlers.get(tool).copied()
    }

    /// Registered tool names in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Outcome of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The tool ran.
    Ok,
    /// The tool failed, or the payload was rejected.
    Error,
    /// No registry knows the tool.
    Noop,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Outcome.
    pub status: Status,
    /// The requested tool name.
    pub tool: String,
    /// Handler result, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Echoed payload, for unknown tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Response {
    /// A successful response.
    pub fn ok(tool: impl Into<String>, result: Value) -> Self {
        Self {
            status: Status::Ok,
            tool: tool.into(),
            result: Some(result),
            message: None,
            payload: None,
        }
    }

    /// An error response.
    pub fn error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            tool: tool.into(),
            result: None,
            message: Some(message.into()),
            payload: None,
        }
    }

    /// The fallback response for unknown tools.
    pub fn noop(tool: impl Into<String>, payload: Value) -> Self {
        Self {
            status: Status::Noop,
            tool: tool.into(),
            result: None,
            message: None,
            payload: Some(payload),
        }
    }

    /// Whether the status is `ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Resolves tool names through the core and enhancement registries.
pub struct Dispatcher<G: GraphMut> {
    core: Registry<G>,
    enhancements: Registry<G>,
}

impl<G: GraphMut> Default for Dispatcher<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GraphMut> Dispatcher<G> {
    /// Creates a dispatcher with every built-in tool registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: queries::registry(),
            enhancements: enhancements::registry(),
        }
    }

    /// The registries in resolution order.
    pub fn registries(&self) -> [&Registry<G>; 2] {
        [&self.core, &self.enhancements]
    }

    fn resolve(&self, tool: &str) -> Option<Handler<G>> {
        self.core.get(tool).or_else(|| self.enhancements.get(tool))
    }

    /// Executes one tool call. Never fails: errors and panics become
    /// `error` responses, unknown tools become `noop` responses.
    pub fn execute(&self, session: &mut Session<G>, tool: &str, payload: Value) -> Response {
        let Some(handler) = self.resolve(tool) else {
            debug!(tool, "No handler registered, echoing payload");
            return Response::noop(tool, payload);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(session, &payload))) {
            Ok(Ok(result)) => Response::ok(tool, result),
            Ok(Err(e)) => {
                warn!(tool, error = %e, "Tool failed");
                Response::error(tool, e.to_string())
            }
            Err(cause) => {
                let message = panic_message(cause.as_ref());
                error!(tool, panic = %message, "Tool panicked");
                Response::error(tool, format!("InternalError: {message}"))
            }
        }
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    cause
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| cause.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}
