//! bim-bridge: command-dispatch bridge over a live building-model element graph
//!
//! A client sends `{tool, payload}` requests. The bridge resolves the tool in
//! layered registries and answers with `{status, tool, result | message}`.
//!
//! # Architecture
//!
//! - **Queries**: parameter, spatial and relational predicates, combined by an
//!   AND/OR combinator. Queries never mutate the graph.
//! - **Batch edits**: one mutating operation per request, inside one
//!   transaction. Per-element operations record failures and carry on; bulk
//!   transforms are all-or-nothing.
//! - **Transactions**: scoped transactions that roll back on drop, plus
//!   explicit transaction groups held by the session.
//!
//! # Modules
//!
//! - [`model`]: Element graph traits and the in-memory document
//! - [`engine`]: Query evaluation, batch execution, transactions, analysis
//! - [`dispatch`]: Registries, typed payloads and the dispatcher
//! - [`bridge`]: stdio line protocol and server loop
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Startup (config and model snapshot) errors

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
