//! Bridge server lifecycle.
//!
//! The server owns the session and processes requests strictly one at a
//! time: read a line, dispatch it, write the response. It stops on EOF or
//! on SIGINT/SIGTERM (Ctrl+C on Windows). A transaction group left open at
//! shutdown is rolled back.

use std::string::FromUtf8Error;

use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Response, Session};
use crate::model::GraphMut;

use super::protocol::{parse_request, ProtocolError};
use super::transport::StdioTransport;

/// Server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Accepting requests.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// A stdio bridge over one graph.
pub struct BridgeServer<G: GraphMut> {
    dispatcher: Dispatcher<G>,
    session: Session<G>,
    transport: StdioTransport,
    state: ServerState,
}

impl<G: GraphMut> BridgeServer<G> {
    /// Creates a server with every built-in tool registered.
    #[must_use]
    pub fn new(session: Session<G>) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            session,
            transport: StdioTransport::stdio(),
            state: ServerState::Running,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// The session.
    #[must_use]
    pub const fn session(&self) -> &Session<G> {
        &self.session
    }

    /// Parses and dispatches one request line.
    pub fn process_line(&mut self, line: &str) -> Response {
        match parse_request(line) {
            Ok(request) => {
                debug!(tool = %request.tool, "Dispatching request");
                self.dispatcher
                    .execute(&mut self.session, &request.tool, request.payload)
            }
            Err(e) => {
                warn!(error = %e, "Rejected request line");
                Response::error("", e.to_string())
            }
        }
    }

    /// Handles one framed line. Blank lines get no response.
    fn handle_frame(&mut self, frame: Result<String, FromUtf8Error>) -> Option<Response> {
        match frame {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(self.process_line(&line)),
            Err(e) => {
                let e = ProtocolError::from(e);
                warn!(error = %e, "Rejected request line");
                Some(Response::error("", e.to_string()))
            }
        }
    }

    /// Serves requests until stdin closes or a shutdown signal arrives, then
    /// rolls back any open transaction group.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or signal handlers cannot be
    /// installed.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let result = self.serve().await;
        self.state = ServerState::ShuttingDown;
        self.close_group();
        result
    }

    async fn serve(&mut self) -> std::io::Result<()> {
        let shutdown = shutdown_signal()?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    info!(signal, "Shutdown signal received");
                    return Ok(());
                }
                frame = self.transport.read_line() => {
                    let Some(frame) = frame? else {
                        info!("stdin closed");
                        return Ok(());
                    };
                    if let Some(response) = self.handle_frame(frame) {
                        self.transport.write_response(&response).await?;
                    }
                }
            }
        }
    }

    fn close_group(&mut self) {
        if let Some(group) = self.session.group_mut().take() {
            warn!(group = group.name(), "Transaction group still open at shutdown");
            group.rollback(self.session.graph_mut());
        }
    }
}

/// Resolves with the name of the first termination signal received.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl std::future::Future<Output = &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    })
}

/// Resolves on Ctrl+C.
#[cfg(windows)]
fn shutdown_signal() -> std::io::Result<impl std::future::Future<Output = &'static str>> {
    Ok(async {
        // A failed handler registration leaves only EOF as the stop condition.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Status;
    use crate::model::{Document, Element, ElementGraph};

    fn server() -> BridgeServer<Document> {
        let mut doc = Document::new("server");
        doc.add_element(Element::new(1).with_category("Walls"));
        BridgeServer::new(Session::new(doc))
    }

    #[test]
    fn initial_state_is_running() {
        assert_eq!(server().state(), ServerState::Running);
    }

    #[test]
    fn process_line_dispatches() {
        let mut server = server();
        let response = server.process_line(
            r#"{"tool": "filter_by_multiple_criteria", "payload": {"criteria": [{"type": "category", "name": "Walls"}]}}"#,
        );
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.result.unwrap()["count"], 1);
    }

    #[test]
    fn bad_line_is_error_response() {
        let mut server = server();
        let response = server.process_line("{");
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.tool, "");
        assert!(response.message.unwrap().starts_with("ValidationError:"));
    }

    #[test]
    fn undecodable_frame_is_error_response_and_serving_continues() {
        let mut server = server();
        let bad = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let response = server.handle_frame(Err(bad)).unwrap();
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.tool, "");
        assert!(response.message.unwrap().starts_with("ValidationError: request is not valid UTF-8"));

        assert!(server.handle_frame(Ok("   ".to_string())).is_none());
        let next = server
            .handle_frame(Ok(r#"{"tool": "list_tools"}"#.to_string()))
            .unwrap();
        assert_eq!(next.status, Status::Ok);
        assert_eq!(server.state(), ServerState::Running);
    }

    #[test]
    fn open_group_is_rolled_back_on_close() {
        let mut server = server();
        server.process_line(r#"{"tool": "begin_transaction_group", "payload": {"group_name": "G"}}"#);
        server.process_line(r#"{"tool": "batch_delete_elements", "payload": {"element_ids": [1]}}"#);
        assert_eq!(server.session().graph().element_count(), 0);
        server.close_group();
        assert_eq!(server.session().graph().element_count(), 1);
        assert!(server.session().active_group().is_none());
    }
}
