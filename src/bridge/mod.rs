//! stdio bridge exposing the dispatcher.
//!
//! ```text
//!   stdin ──▶ Transport ──▶ Server ──▶ Dispatcher ──▶ core / enhancements
//!                             │                              │
//!   stdout ◀── Transport ◀────┴──────── Response ◀───────────┘
//! ```

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{parse_request, ProtocolError, Request};
pub use server::{BridgeServer, ServerState};
pub use transport::{LineTransport, StdioTransport};
