#![allow(dead_code)]

use plysnap::dap::transport::{read_message, write_message};
use serde_json::{json, Value};
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_DELAY: Duration = Duration::from_millis(10);

/// What the mock adapter does with a request.
pub enum Reply {
    Body(Value),
    Fail(String),
    /// Never answer.
    Ignore,
}

type Handler = Box<dyn Fn(&str, &Value) -> Reply + Send>;

/// Scripted debug adapter on a local TCP port, serves one client.
pub struct MockAdapter {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    stream: Arc<Mutex<Option<TcpStream>>>,
    seq: Arc<AtomicI64>,
}

impl MockAdapter {
    pub fn start(handler: impl Fn(&str, &Value) -> Reply + Send + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let adapter = Self {
            addr,
            requests: Arc::default(),
            stream: Arc::default(),
            seq: Arc::new(AtomicI64::new(1)),
        };

        let handler: Handler = Box::new(handler);
        let requests = adapter.requests.clone();
        let stream = adapter.stream.clone();
        let seq = adapter.seq.clone();
        thread::spawn(move || {
            let Ok((conn, _)) = listener.accept() else {
                return;
            };
            *stream.lock().unwrap() = Some(conn.try_clone().unwrap());
            let mut reader = BufReader::new(conn);

            while let Ok(msg) = read_message(&mut reader) {
                requests.lock().unwrap().push(msg.clone());
                let command = msg["command"].as_str().unwrap_or_default().to_string();
                let reply = handler(&command, &msg["arguments"]);

                let mut guard = stream.lock().unwrap();
                let Some(out) = guard.as_mut() else {
                    break;
                };
                if command == "attach" {
                    let event = json!({
                        "seq": seq.fetch_add(1, Ordering::SeqCst),
                        "type": "event",
                        "event": "initialized",
                    });
                    if write_message(out, &event).is_err() {
                        break;
                    }
                }

                let mut response = json!({
                    "seq": seq.fetch_add(1, Ordering::SeqCst),
                    "type": "response",
                    "request_seq": msg["seq"],
                    "command": command,
                });
                match reply {
                    Reply::Body(body) => {
                        response["success"] = json!(true);
                        response["body"] = body;
                    }
                    Reply::Fail(message) => {
                        response["success"] = json!(false);
                        response["message"] = json!(message);
                    }
                    Reply::Ignore => continue,
                }
                if write_message(out, &response).is_err() {
                    break;
                }
            }
        });

        adapter
    }

    /// Send an event to the connected client.
    pub fn emit(&self, event: &str, body: Value) {
        self.wait_connected();
        let mut guard = self.stream.lock().unwrap();
        let out = guard.as_mut().unwrap();
        let event = json!({
            "seq": self.seq.fetch_add(1, Ordering::SeqCst),
            "type": "event",
            "event": event,
            "body": body,
        });
        write_message(out, &event).unwrap();
    }

    /// Drop the connection.
    pub fn close(&self) {
        self.wait_connected();
        if let Some(stream) = self.stream.lock().unwrap().take() {
            _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["command"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Wait until `n` requests arrived.
    pub fn wait_requests(&self, n: usize) -> Vec<Value> {
        let start = Instant::now();
        loop {
            let requests = self.requests();
            if requests.len() >= n {
                return requests;
            }
            assert!(start.elapsed() < WAIT_TIMEOUT, "got only {requests:?}");
            thread::sleep(POLL_DELAY);
        }
    }

    fn wait_connected(&self) {
        let start = Instant::now();
        while self.stream.lock().unwrap().is_none() {
            assert!(start.elapsed() < WAIT_TIMEOUT, "no client connected");
            thread::sleep(POLL_DELAY);
        }
    }
}

/// Answers like a debugpy session paused in `<module>` with the given locals. Evaluate
/// requests go to `evaluate(expression, context)`.
pub fn paused_python(
    locals: Vec<(&'static str, &'static str)>,
    evaluate: impl Fn(&str, &str) -> Reply + Send + 'static,
) -> impl Fn(&str, &Value) -> Reply + Send + 'static {
    move |command, args| match command {
        "initialize" => Reply::Body(json!({"supportsConfigurationDoneRequest": true})),
        "attach" | "configurationDone" | "disconnect" => Reply::Body(json!({})),
        "threads" => Reply::Body(json!({"threads": [{"id": 1, "name": "MainThread"}]})),
        "stackTrace" => Reply::Body(json!({
            "stackFrames": [
                {"id": 7, "name": "<module>", "line": 12, "column": 1},
            ],
            "totalFrames": 1,
        })),
        "scopes" => Reply::Body(json!({
            "scopes": [{"name": "Locals", "variablesReference": 11, "expensive": false}],
        })),
        "variables" => Reply::Body(json!({
            "variables": locals
                .iter()
                .map(|(name, ty)| json!({
                    "name": name,
                    "value": "...",
                    "type": ty,
                    "evaluateName": name,
                    "variablesReference": 0,
                }))
                .collect::<Vec<_>>(),
        })),
        "evaluate" => evaluate(
            args["expression"].as_str().unwrap_or_default(),
            args["context"].as_str().unwrap_or_default(),
        ),
        other => Reply::Fail(format!("unsupported request {other}")),
    }
}

/// Evaluate response body as debugpy sends it.
pub fn result(value: &str) -> Reply {
    Reply::Body(json!({"result": value, "variablesReference": 0}))
}

pub fn client_stream(adapter: &MockAdapter) -> TcpStream {
    TcpStream::connect(adapter.addr).unwrap()
}
