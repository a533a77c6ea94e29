use std::collections::HashMap;
use std::process::Child;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use serde_json::{json, Value};

use super::protocol::{Event, ProtocolMessage, Request, Response};
use super::transport::{MessageReader, MessageWriter, Transport};
use super::DapError;

/// Something the adapter told us outside of a request/response pair.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Event(Event),
    /// Connection is gone, the payload is the reason.
    Closed(String),
}

type Waiter = mpsc::Sender<Result<Response, DapError>>;

#[derive(Default)]
struct Pending {
    waiters: HashMap<i64, Waiter>,
    closed: bool,
}

/// Response that has not arrived yet.
pub struct PendingResponse {
    command: String,
    receiver: mpsc::Receiver<Result<Response, DapError>>,
}

impl PendingResponse {
    /// Block until the adapter answers or the connection is lost.
    pub fn wait(self) -> Result<Response, DapError> {
        let rsp = self.receiver.recv().map_err(|_| DapError::Closed)??;
        log::debug!(target: "plysnap::dap", "{} answered, success: {}", self.command, rsp.success);
        Ok(rsp)
    }

    /// Return the answer if it is already there.
    pub fn try_wait(&self) -> Option<Result<Response, DapError>> {
        match self.receiver.try_recv() {
            Ok(res) => Some(res),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(DapError::Closed)),
        }
    }
}

/// DAP client.
///
/// A background thread reads everything the adapter sends: responses are routed to the
/// request that waits for them (matched by `request_seq`), events go to the event channel
/// returned from [`DapClient::start`]. Requests may be issued from any thread.
pub struct DapClient {
    writer: Arc<Mutex<MessageWriter>>,
    next_seq: Arc<AtomicI64>,
    pending: Arc<Mutex<Pending>>,
    child: Mutex<Option<Child>>,
}

impl DapClient {
    pub fn start(transport: Transport) -> Result<(DapClient, mpsc::Receiver<ClientEvent>), DapError> {
        let (reader, writer, child) = transport.split();
        let (events_tx, events_rx) = mpsc::channel();

        let client = DapClient {
            writer: Arc::new(Mutex::new(writer)),
            next_seq: Arc::new(AtomicI64::new(1)),
            pending: Arc::new(Mutex::new(Pending::default())),
            child: Mutex::new(child),
        };

        thread::Builder::new()
            .name("dap-reader".to_string())
            .spawn({
                let writer = client.writer.clone();
                let next_seq = client.next_seq.clone();
                let pending = client.pending.clone();
                move || read_loop(reader, writer, next_seq, pending, events_tx)
            })?;

        Ok((client, events_rx))
    }

    /// Send a request without waiting for the answer.
    pub fn send(&self, command: &str, arguments: Value) -> Result<PendingResponse, DapError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel();
        {
            let mut pending = self.pending.lock().expect("pending lock");
            if pending.closed {
                return Err(DapError::Closed);
            }
            pending.waiters.insert(seq, sender);
        }

        let request = Request {
            seq,
            r#type: "request",
            command,
            arguments,
        };
        log::debug!(target: "plysnap::dap", "{seq}: {command}");
        let res = serde_json::to_value(&request)
            .map_err(DapError::from)
            .and_then(|msg| self.writer.lock().expect("writer lock").write_message(&msg));
        if let Err(e) = res {
            self.pending
                .lock()
                .expect("pending lock")
                .waiters
                .remove(&seq);
            return Err(e);
        }

        Ok(PendingResponse {
            command: command.to_string(),
            receiver,
        })
    }

    /// Send a request and block until it is answered.
    pub fn request(&self, command: &str, arguments: Value) -> Result<Response, DapError> {
        self.send(command, arguments)?.wait()
    }

    pub fn is_closed(&self) -> bool {
        self.pending.lock().expect("pending lock").closed
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.lock() {
            if let Some(mut child) = child.take() {
                _ = child.kill();
                _ = child.wait();
            }
        }
    }
}

fn read_loop(
    mut reader: MessageReader,
    writer: Arc<Mutex<MessageWriter>>,
    next_seq: Arc<AtomicI64>,
    pending: Arc<Mutex<Pending>>,
    events: mpsc::Sender<ClientEvent>,
) {
    let reason = loop {
        let msg = match reader.read_message() {
            Ok(msg) => msg,
            Err(e) => break e.to_string(),
        };
        let msg: ProtocolMessage = match serde_json::from_value(msg) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!(target: "plysnap::dap", "skip unrecognized message: {e}");
                continue;
            }
        };

        match msg {
            ProtocolMessage::Response(rsp) => {
                let waiter = pending
                    .lock()
                    .expect("pending lock")
                    .waiters
                    .remove(&rsp.request_seq);
                match waiter {
                    Some(waiter) => {
                        _ = waiter.send(Ok(rsp));
                    }
                    None => log::debug!(
                        target: "plysnap::dap",
                        "response to unknown request {}", rsp.request_seq
                    ),
                }
            }
            ProtocolMessage::Event(event) => {
                log::debug!(target: "plysnap::dap", "event: {}", event.event);
                // receiver may be gone already, responses are still routed
                _ = events.send(ClientEvent::Event(event));
            }
            ProtocolMessage::Request(req) => {
                let seq = next_seq.fetch_add(1, Ordering::SeqCst);
                let rsp = json!({
                    "seq": seq,
                    "type": "response",
                    "request_seq": req.seq,
                    "success": false,
                    "command": req.command,
                    "message": format!("{} is not supported by this client", req.command),
                });
                if let Err(e) = writer.lock().expect("writer lock").write_message(&rsp) {
                    break e.to_string();
                }
            }
        }
    };

    log::debug!(target: "plysnap::dap", "reader stopped: {reason}");
    let waiters = {
        let mut pending = pending.lock().expect("pending lock");
        pending.closed = true;
        std::mem::take(&mut pending.waiters)
    };
    for (_, waiter) in waiters {
        _ = waiter.send(Err(DapError::Closed));
    }
    _ = events.send(ClientEvent::Closed(reason));
}
