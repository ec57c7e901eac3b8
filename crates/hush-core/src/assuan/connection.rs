//! Assuan connection engine
//!
//! Drives one peer process over a byte stream pair. Commands are written as
//! single lines; a background read task decodes incoming lines and resolves
//! outstanding commands strictly in issue order (Assuan replies are
//! in-order, so correlation is a FIFO queue). A reply arriving with no
//! command outstanding is a protocol violation and shuts the connection
//! down rather than panicking.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};

use super::protocol::{self, AssuanResponse, ReplyLine};
use crate::error::PromptError;

type ReplySender = oneshot::Sender<Result<AssuanResponse, PromptError>>;

/// State shared between the connection handle and its read task.
///
/// Invariants: `pending` holds one entry per command issued but not yet
/// resolved; `data` holds fragments belonging to the oldest pending
/// command; `ready` flips false -> true exactly once, on the greeting.
struct Shared {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    ready: bool,
    ready_tx: Option<oneshot::Sender<()>>,
    pending: VecDeque<ReplySender>,
    data: Vec<u8>,
    closed: bool,
}

/// The eventual reply to one issued command. Fulfilled or failed exactly
/// once, in the order commands were issued.
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<AssuanResponse, PromptError>>,
}

impl PendingReply {
    /// Wait for the peer's reply.
    pub async fn wait(self) -> Result<AssuanResponse, PromptError> {
        match self.rx.await {
            Ok(result) => result,
            // Sender dropped: the connection shut down before replying
            Err(_) => Err(PromptError::ConnectionClosed),
        }
    }
}

/// One Assuan connection to one peer process.
pub struct AssuanConnection {
    shared: Arc<Mutex<Shared>>,
    ready_rx: Option<oneshot::Receiver<()>>,
    /// Keeps the child alive; `kill_on_drop` reaps it with the connection.
    _child: Option<Child>,
}

impl AssuanConnection {
    /// Attach the engine to an arbitrary stream pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::attach(reader, writer, None)
    }

    /// Spawn a pinentry process and speak Assuan over its stdio.
    ///
    /// The child inherits the current process environment. `kill_on_drop`
    /// guarantees it is reaped even if the final BYE never reaches it.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, PromptError> {
        tracing::debug!(program = %program.display(), ?args, "spawning pinentry");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PromptError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| PromptError::Spawn {
            program: program.display().to_string(),
            source: io::Error::other("child has no stdin"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| PromptError::Spawn {
            program: program.display().to_string(),
            source: io::Error::other("child has no stdout"),
        })?;

        Ok(Self::attach(stdout, stdin, Some(child)))
    }

    fn attach<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = Arc::new(Mutex::new(Shared {
            writer: Box::new(writer),
            ready: false,
            ready_tx: Some(ready_tx),
            pending: VecDeque::new(),
            data: Vec::new(),
            closed: false,
        }));

        tokio::spawn(read_loop(reader, Arc::clone(&shared)));

        Self {
            shared,
            ready_rx: Some(ready_rx),
            _child: child,
        }
    }

    /// Wait for the peer's unsolicited greeting. Must complete before any
    /// command is issued.
    pub async fn wait_ready(&mut self) -> Result<(), PromptError> {
        let Some(rx) = self.ready_rx.take() else {
            return Ok(());
        };
        rx.await.map_err(|_| PromptError::ConnectionClosed)
    }

    /// Issue a command and return its pending reply without waiting for it.
    ///
    /// The outgoing line is the command token and arguments joined by single
    /// spaces; no escaping is applied, callers pre-encode values.
    pub async fn send_command(
        &self,
        command: &str,
        args: &[&str],
    ) -> Result<PendingReply, PromptError> {
        let mut line = command.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }

        let (tx, rx) = oneshot::channel();
        let mut shared = self.shared.lock().await;
        if shared.closed {
            return Err(PromptError::ConnectionClosed);
        }

        // Enqueue before writing, under the same lock, so the reply cannot
        // race the queue entry and ordering matches the wire.
        shared.pending.push_back(tx);
        tracing::trace!(command, "assuan send");
        if let Err(e) = write_line(&mut shared.writer, &line).await {
            shared.pending.pop_back();
            return Err(e.into());
        }

        Ok(PendingReply { rx })
    }

    /// Issue a command and wait for its reply.
    pub async fn request(
        &self,
        command: &str,
        args: &[&str],
    ) -> Result<AssuanResponse, PromptError> {
        self.send_command(command, args).await?.wait().await
    }

    /// Whether the connection has shut down (transport closed or protocol
    /// violation). No further commands can be issued once closed.
    pub async fn is_closed(&self) -> bool {
        self.shared.lock().await.closed
    }
}

async fn write_line(
    writer: &mut (impl AsyncWrite + Unpin + ?Sized),
    line: &str,
) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Consume reply lines until the transport closes or the peer breaks
/// protocol, resolving pending commands in FIFO order.
async fn read_loop<R>(reader: R, shared: Arc<Mutex<Shared>>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = match reader.read_until(b'\n', &mut buf).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "assuan transport read error");
                shutdown(&shared, || PromptError::ConnectionClosed).await;
                return;
            }
        };
        if n == 0 {
            tracing::debug!("assuan transport closed");
            shutdown(&shared, || PromptError::ConnectionClosed).await;
            return;
        }
        while buf.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            buf.pop();
        }

        match protocol::parse_line(&buf) {
            ReplyLine::Comment | ReplyLine::Other => {}
            ReplyLine::Data(fragment) => {
                shared.lock().await.data.extend_from_slice(&fragment);
            }
            ReplyLine::Ok(line) => {
                let mut state = shared.lock().await;
                if !state.ready {
                    // The greeting: resolves nothing
                    state.ready = true;
                    if let Some(tx) = state.ready_tx.take() {
                        let _ = tx.send(());
                    }
                } else if let Some(tx) = state.pending.pop_front() {
                    let data = std::mem::take(&mut state.data);
                    let _ = tx.send(Ok(AssuanResponse {
                        data,
                        status_line: line,
                    }));
                } else {
                    drop(state);
                    tracing::error!(line = %line, "assuan reply with no pending command");
                    shutdown(&shared, || PromptError::ProtocolViolation {
                        reason: "reply received with no command outstanding".to_string(),
                    })
                    .await;
                    return;
                }
            }
            ReplyLine::Err(line) => {
                let mut state = shared.lock().await;
                if let Some(tx) = state.pending.pop_front() {
                    state.data.clear();
                    let _ = tx.send(Err(PromptError::Protocol { line }));
                } else {
                    drop(state);
                    tracing::error!(line = %line, "assuan error with no pending command");
                    shutdown(&shared, || PromptError::ProtocolViolation {
                        reason: "error received with no command outstanding".to_string(),
                    })
                    .await;
                    return;
                }
            }
        }
    }
}

/// Mark the connection closed and fail every outstanding command.
async fn shutdown(shared: &Mutex<Shared>, error: impl Fn() -> PromptError) {
    let mut state = shared.lock().await;
    state.closed = true;
    state.ready_tx.take();
    state.data.clear();
    for tx in state.pending.drain(..) {
        let _ = tx.send(Err(error()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn connected() -> (AssuanConnection, DuplexStream) {
        let (client, server) = tokio::io::duplex(4096);
        let (read, write) = tokio::io::split(client);
        (AssuanConnection::new(read, write), server)
    }

    async fn wait_closed(conn: &AssuanConnection) {
        for _ in 0..100 {
            if conn.is_closed().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connection never closed");
    }

    #[tokio::test]
    async fn greeting_makes_connection_ready() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK Pleased to meet you\n").await.unwrap();
        conn.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn comments_are_ignored_in_every_state() {
        let (mut conn, mut server) = connected();
        server.write_all(b"# hello\nOK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        let pending = conn.send_command("GETPIN", &[]).await.unwrap();
        server
            .write_all(b"# thinking\nD hunter2\n# still thinking\nOK\n")
            .await
            .unwrap();

        let response = pending.wait().await.unwrap();
        assert_eq!(response.data, b"hunter2");
    }

    #[tokio::test]
    async fn fifo_resolves_replies_in_issue_order() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        // Three commands outstanding before any reply arrives
        let first = conn.send_command("SETPROMPT", &["Password:"]).await.unwrap();
        let second = conn.send_command("SETDESC", &["why"]).await.unwrap();
        let third = conn.send_command("GETPIN", &[]).await.unwrap();

        server
            .write_all(b"OK first\nD frag\nD ment\nOK second\nERR 1 failed\n")
            .await
            .unwrap();

        let r1 = first.wait().await.unwrap();
        assert!(r1.data.is_empty());
        assert_eq!(r1.status_line, "OK first");

        let r2 = second.wait().await.unwrap();
        assert_eq!(r2.data, b"fragment");
        assert_eq!(r2.status_line, "OK second");

        match third.wait().await {
            Err(PromptError::Protocol { line }) => assert_eq!(line, "ERR 1 failed"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn data_fragments_are_escape_decoded() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        let pending = conn.send_command("GETPIN", &[]).await.unwrap();
        server.write_all(b"D 100%25%0A%0D\nOK\n").await.unwrap();

        let response = pending.wait().await.unwrap();
        assert_eq!(response.data, b"100%\r\n");
    }

    #[tokio::test]
    async fn outgoing_line_joins_command_and_args() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        let _pending = conn
            .send_command("SETPROMPT", &["Passphrase:"])
            .await
            .unwrap();

        let mut buf = vec![0u8; 64];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"SETPROMPT Passphrase:\n");
    }

    #[tokio::test]
    async fn unsolicited_reply_is_a_protocol_violation() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        let pending = conn.send_command("GETPIN", &[]).await.unwrap();
        // One reply for the pending command, then one nobody asked for
        server.write_all(b"OK\nOK surprise\n").await.unwrap();

        pending.wait().await.unwrap();
        wait_closed(&conn).await;

        match conn.send_command("BYE", &[]).await {
            Err(PromptError::ConnectionClosed) => {}
            other => panic!("expected closed connection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_close_fails_outstanding_commands() {
        let (mut conn, mut server) = connected();
        server.write_all(b"OK ready\n").await.unwrap();
        conn.wait_ready().await.unwrap();

        let pending = conn.send_command("GETPIN", &[]).await.unwrap();
        drop(server);

        match pending.wait().await {
            Err(PromptError::ConnectionClosed) => {}
            other => panic!("expected closed connection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_close_before_greeting_fails_wait_ready() {
        let (mut conn, server) = connected();
        drop(server);

        match conn.wait_ready().await {
            Err(PromptError::ConnectionClosed) => {}
            other => panic!("expected closed connection, got {other:?}"),
        }
    }
}
