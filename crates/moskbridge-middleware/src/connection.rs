//! TCP link to the counterpart.
//!
//! [`Bridge`] is the single task that owns the [`Session`] and the host rig.
//! It multiplexes two sources with `tokio::select!`:
//!
//! 1. newline-delimited JSON read from the counterpart socket, and
//! 2. [`ShellRequest`]s sent by the shell through a [`BridgeHandle`].
//!
//! Packets are handled strictly in receipt order; nothing else touches the
//! session, so no locking is involved.
//!
//! Lines are read as raw bytes.  A line that is not UTF-8 or grows past
//! [`MAX_LINE_BYTES`] is reported as a malformed packet and skipped; only
//! socket errors and EOF end the session.

use std::future;
use std::io;
use std::time::Duration;

use moskbridge_rig::HostRig;
use moskbridge_types::{BridgeError, OutgoingMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::session::{Reply, Session};

/// Default counterpart port.
pub const DEFAULT_PORT: u16 = 16094;
/// Default counterpart address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_QUEUE: usize = 32;

/// Longest line accepted from the counterpart, newline excluded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Actions the shell can ask of the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellRequest {
    Connect,
    Disconnect,
    /// Push the host pose to the counterpart.
    UpdateCounterpart,
    Select {
        joint: String,
        erase_group: bool,
        toggle_if_selected: bool,
    },
    Sketchable {
        joint: String,
        sketchable: bool,
    },
    Wireframe(bool),
    AttachEffector,
    /// Publish a one-line session summary on the status bus.
    Status,
    /// Close the link if open and stop the task.
    Shutdown,
}

/// Cloneable sender side used by the shell.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    requests: mpsc::Sender<ShellRequest>,
}

impl BridgeHandle {
    pub async fn send(&self, request: ShellRequest) -> Result<(), BridgeError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| BridgeError::Transport("bridge task has stopped".to_string()))
    }

    /// Non-async variant for signal handlers.
    pub fn try_send(&self, request: ShellRequest) -> Result<(), BridgeError> {
        self.requests
            .try_send(request)
            .map_err(|e| BridgeError::Transport(format!("cannot reach bridge task: {e}")))
    }

    /// Resolves once the bridge task has stopped.
    pub async fn closed(&self) {
        self.requests.closed().await
    }
}

struct Link {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Bytes of the line being assembled.  Kept across reads so a read
    /// cancelled by `select!` loses nothing.
    pending: Vec<u8>,
    /// Dropping the remainder of an overlong line.
    discarding: bool,
}

/// One unit read from the counterpart.
#[derive(Debug, PartialEq)]
enum Frame {
    Line(Vec<u8>),
    /// The current line passed [`MAX_LINE_BYTES`]; its remainder is dropped.
    Overflow,
    Eof,
}

impl Link {
    fn new(read: OwnedReadHalf, writer: OwnedWriteHalf) -> Self {
        Self {
            reader: BufReader::new(read),
            writer,
            pending: Vec::new(),
            discarding: false,
        }
    }

    async fn next_frame(&mut self) -> io::Result<Frame> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(Frame::Eof);
            }
            let (chunk, end_of_line) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], true),
                None => (available, false),
            };
            let consumed = chunk.len() + usize::from(end_of_line);
            if !self.discarding {
                self.pending.extend_from_slice(chunk);
            }
            self.reader.consume(consumed);

            if end_of_line {
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                let mut line = std::mem::take(&mut self.pending);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Frame::Line(line));
            }
            if !self.discarding && self.pending.len() > MAX_LINE_BYTES {
                self.pending = Vec::new();
                self.discarding = true;
                return Ok(Frame::Overflow);
            }
        }
    }
}

pub struct Bridge {
    session: Session,
    rig: Box<dyn HostRig>,
    endpoint: String,
    requests: mpsc::Receiver<ShellRequest>,
    link: Option<Link>,
}

impl Bridge {
    pub fn new(
        session: Session,
        rig: Box<dyn HostRig>,
        endpoint: impl Into<String>,
    ) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let bridge = Self {
            session,
            rig,
            endpoint: endpoint.into(),
            requests: rx,
            link: None,
        };
        (bridge, BridgeHandle { requests: tx })
    }

    /// Spawn the connection task.  The task hands the rig back when it stops.
    pub fn spawn(
        session: Session,
        rig: Box<dyn HostRig>,
        endpoint: impl Into<String>,
    ) -> (BridgeHandle, JoinHandle<Box<dyn HostRig>>) {
        let (bridge, handle) = Self::new(session, rig, endpoint);
        (handle, tokio::spawn(bridge.run()))
    }

    /// Run until [`ShellRequest::Shutdown`] or until every handle is dropped.
    pub async fn run(mut self) -> Box<dyn HostRig> {
        info!(endpoint = %self.endpoint, "bridge task started");
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    match request {
                        Some(ShellRequest::Shutdown) | None => break,
                        Some(request) => self.handle_request(request).await,
                    }
                }
                frame = next_frame(&mut self.link) => self.handle_read(frame).await,
            }
        }
        if self.link.is_some() {
            let reply = self.session.close();
            self.deliver(reply).await;
        }
        info!("bridge task stopped");
        self.rig
    }

    async fn handle_request(&mut self, request: ShellRequest) {
        debug!(request = ?request, "shell request");
        let outgoing = match request {
            ShellRequest::Connect => {
                self.connect().await;
                return;
            }
            ShellRequest::Disconnect => {
                let reply = self.session.close();
                self.deliver(reply).await;
                return;
            }
            ShellRequest::Status => {
                self.publish_summary();
                return;
            }
            ShellRequest::UpdateCounterpart => self.session.update_counterpart(self.rig.as_ref()),
            ShellRequest::Select {
                joint,
                erase_group,
                toggle_if_selected,
            } => self
                .session
                .select_joint(&joint, erase_group, toggle_if_selected),
            ShellRequest::Sketchable { joint, sketchable } => {
                self.session.set_sketchable(&joint, sketchable)
            }
            ShellRequest::Wireframe(visible) => self.session.set_wireframe(visible),
            ShellRequest::AttachEffector => self.session.attach_ik_effector(),
            ShellRequest::Shutdown => return,
        };
        // Failures were already published by the session.
        if let Ok(message) = outgoing {
            self.deliver(Reply {
                messages: vec![message],
                close: false,
            })
            .await;
        }
    }

    async fn connect(&mut self) {
        if self.session.begin_connect(&self.endpoint).is_err() {
            return;
        }
        let attempt = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.endpoint)).await;
        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let err = BridgeError::Transport(format!("cannot connect to {}: {e}", self.endpoint));
                self.session.on_transport_error(&err);
                return;
            }
            Err(_) => {
                let err = BridgeError::Transport(format!("timed out connecting to {}", self.endpoint));
                self.session.on_transport_error(&err);
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "cannot disable Nagle on counterpart socket");
        }
        let (read, writer) = stream.into_split();
        self.link = Some(Link::new(read, writer));
        self.session.on_connected();
    }

    async fn handle_read(&mut self, frame: io::Result<Frame>) {
        match frame {
            Ok(Frame::Line(bytes)) => {
                trace!(bytes = bytes.len(), "line received");
                match String::from_utf8(bytes) {
                    Ok(line) => {
                        let reply = self.session.handle_line(self.rig.as_mut(), &line);
                        self.deliver(reply).await;
                    }
                    Err(e) => self.session.on_malformed(&BridgeError::MalformedPacket(format!(
                        "line is not valid UTF-8: {}",
                        e.utf8_error()
                    ))),
                }
            }
            Ok(Frame::Overflow) => self.session.on_malformed(&BridgeError::MalformedPacket(
                format!("line longer than {MAX_LINE_BYTES} bytes"),
            )),
            Ok(Frame::Eof) => {
                info!(endpoint = %self.endpoint, "counterpart closed the connection");
                self.link = None;
                self.session.on_disconnected();
            }
            Err(e) => {
                self.link = None;
                self.session
                    .on_transport_error(&BridgeError::Transport(format!("read failed: {e}")));
            }
        }
    }

    /// Write `reply` in order, then drop the link if asked to.
    async fn deliver(&mut self, reply: Reply) {
        for message in &reply.messages {
            if let Err(e) = self.write(message).await {
                self.link = None;
                self.session.on_transport_error(&e);
                return;
            }
        }
        if reply.close {
            if let Some(mut link) = self.link.take() {
                if let Err(e) = link.writer.shutdown().await {
                    debug!(error = %e, "socket shutdown failed");
                }
            }
        }
    }

    async fn write(&mut self, message: &OutgoingMessage) -> Result<(), BridgeError> {
        let Some(link) = self.link.as_mut() else {
            debug!(message = message.label(), "no link, message dropped");
            return Ok(());
        };
        let mut line = message.encode()?;
        line.push('\n');
        link.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::Transport(format!("write failed: {e}")))?;
        trace!(message = message.label(), "message sent");
        Ok(())
    }

    fn publish_summary(&self) {
        let session = &self.session;
        let binding = session.binding();
        let bus_message = format!(
            "{} | {} | profile {} | {} joints, {} controllers bound | {} uuids",
            session.state(),
            self.endpoint,
            session.settings().profile.name,
            binding.joints.len(),
            binding.controllers.len(),
            session.uuid_count()
        );
        session.status_bus().info(bus_message);
    }
}

/// Next frame from the link; pends forever while disconnected.
async fn next_frame(link: &mut Option<Link>) -> io::Result<Frame> {
    match link {
        Some(link) => link.next_frame().await,
        None => future::pending().await,
    }
}
