//! Line transport for the bridge.
//!
//! One UTF-8 JSON document per line in each direction. The server reads
//! requests from stdin and writes responses to stdout; stderr carries logs
//! only. The transport is generic over its streams so it can be driven from
//! in-memory buffers.

use std::io;
use std::string::FromUtf8Error;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::trace;

use crate::dispatch::Response;

/// Reads request lines from `R` and writes response lines to `W`.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
    buf: Vec<u8>,
}

/// The transport the binary uses.
pub type StdioTransport = LineTransport<Stdin, Stdout>;

impl StdioTransport {
    /// Binds to the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::stdio()
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps a reader and a writer.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    ///
    /// A line that is not UTF-8 is returned as the decode error; the stream
    /// stays positioned at the following line.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the stream fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Result<String, FromUtf8Error>>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let mut line = self.buf.as_slice();
        while let [rest @ .., b'\n' | b'\r'] = line {
            line = rest;
        }
        trace!(bytes = line.len(), "Read request line");
        Ok(Some(String::from_utf8(line.to_vec())))
    }

    /// Writes one response line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &Response) -> io::Result<()> {
        // serde_json escapes control characters, so the payload is one line.
        let mut line = serde_json::to_vec(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }

    /// Consumes the transport, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn reads_lines_without_terminators() {
        let input: &[u8] = b"{\"tool\": \"a\"}\r\n\n{\"tool\": \"b\"}";
        let mut transport = LineTransport::new(input, Vec::new());

        for expected in [r#"{"tool": "a"}"#, "", r#"{"tool": "b"}"#] {
            let line = transport.read_line().await.unwrap().unwrap().unwrap();
            assert_eq!(line, expected);
        }
        assert!(transport.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_line_does_not_end_the_stream() {
        let input: &[u8] = b"\xff\xfe\n{\"tool\":\"list_tools\"}\n";
        let mut transport = LineTransport::new(input, Vec::new());

        let first = transport.read_line().await.unwrap().unwrap();
        assert!(first.is_err());
        let second = transport.read_line().await.unwrap().unwrap();
        assert_eq!(second.unwrap(), r#"{"tool":"list_tools"}"#);
        assert!(transport.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn responses_are_single_lines() {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        let response = Response::ok(
            "get_element_statistics",
            json!({
                "total_count": 3,
                "top_types": [{ "type_name": "Generic\n200mm", "count": 3 }]
            }),
        );
        transport.write_response(&response).await.unwrap();
        transport
            .write_response(&Response::error("batch_delete_elements", "HostError: x"))
            .await
            .unwrap();

        let written = String::from_utf8(transport.into_writer()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["result"]["top_types"][0]["type_name"], "Generic\n200mm");
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], "error");
    }

    #[test]
    fn stdio_transport_default() {
        let _transport = StdioTransport::default();
    }
}
