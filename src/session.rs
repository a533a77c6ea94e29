//! The debug session contract consumed by the previewer and its DAP implementation.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use strum_macros::{Display, IntoStaticStr};

use crate::dap::protocol::{
    EvaluateResponse, Scope, ScopesBody, StackFrame, StackTraceBody, Thread, ThreadsBody,
    Variable, VariablesBody,
};
use crate::dap::{ClientEvent, DapClient, DapError, Transport};

/// Evaluation mode passed with an `evaluate` request.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, IntoStaticStr)]
pub enum EvaluateContext {
    /// Side-effect free single expression.
    #[strum(serialize = "watch")]
    Watch,
    /// Statements allowed.
    #[strum(serialize = "repl")]
    Repl,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{command} request failed: {message}")]
    Rejected { command: String, message: String },
    #[error("unexpected {command} response body: {source}")]
    Body {
        command: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Dap(#[from] DapError),
}

/// A running debuggee as seen through its debug adapter.
///
/// All methods are remote round trips and may fail at any moment (the debuggee may resume
/// or terminate concurrently).
pub trait DebugSession {
    /// Stable identifier of the session.
    fn id(&self) -> &str;

    fn threads(&self) -> Result<Vec<Thread>, SessionError>;

    /// Stack frames of a thread, innermost first. `levels` limits the number of frames.
    fn stack_trace(&self, thread_id: i64, levels: Option<u32>)
        -> Result<Vec<StackFrame>, SessionError>;

    fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, SessionError>;

    fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, SessionError>;

    /// Evaluate `expression` in a frame and return the textual result.
    fn evaluate(
        &self,
        expression: &str,
        frame_id: i64,
        context: EvaluateContext,
    ) -> Result<String, SessionError>;
}

const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

/// [`DebugSession`] over a DAP connection.
pub struct DapSession {
    id: String,
    client: DapClient,
}

impl DapSession {
    pub fn new(id: impl Into<String>, client: DapClient) -> Self {
        Self {
            id: id.into(),
            client,
        }
    }

    /// Run the attach handshake over `transport`.
    ///
    /// Returns the session and the channel with every event the adapter sends afterwards.
    pub fn attach(
        transport: Transport,
        arguments: Value,
    ) -> anyhow::Result<(DapSession, mpsc::Receiver<ClientEvent>)> {
        let (client, events) = DapClient::start(transport)?;

        let init = client.request(
            "initialize",
            json!({
                "clientID": "plysnap",
                "clientName": "plysnap",
                "adapterID": "python",
                "linesStartAt1": true,
                "columnsStartAt1": true,
                "pathFormat": "path",
                "supportsVariableType": true,
            }),
        )?;
        if !init.success {
            bail!("initialize rejected: {}", init.error_message());
        }

        let attach = client.send("attach", arguments)?;
        let mut attached = None;
        loop {
            if attached.is_none() {
                if let Some(rsp) = attach.try_wait() {
                    let rsp = rsp?;
                    if !rsp.success {
                        bail!("attach rejected: {}", rsp.error_message());
                    }
                    attached = Some(rsp);
                }
            }

            match events.recv_timeout(HANDSHAKE_POLL) {
                Ok(ClientEvent::Event(ev)) if ev.event == "initialized" => break,
                Ok(ClientEvent::Event(ev)) if ev.is_termination() => {
                    bail!("debuggee terminated during attach")
                }
                Ok(ClientEvent::Event(_)) | Err(RecvTimeoutError::Timeout) => continue,
                Ok(ClientEvent::Closed(reason)) => {
                    bail!("adapter closed the connection: {reason}")
                }
                Err(RecvTimeoutError::Disconnected) => bail!("adapter reader stopped"),
            }
        }

        let done = client.request("configurationDone", json!({}))?;
        if !done.success {
            bail!("configurationDone rejected: {}", done.error_message());
        }

        if attached.is_none() {
            let rsp = attach.wait()?;
            if !rsp.success {
                return Err(anyhow!("attach rejected: {}", rsp.error_message()));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        log::info!(target: "plysnap::dap", "attached, session {id}");
        Ok((DapSession::new(id, client), events))
    }

    /// Detach from the debuggee, leaving it running.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.call::<Value>("disconnect", json!({"terminateDebuggee": false}))
            .map(|_| ())
    }

    fn call<T: DeserializeOwned>(&self, command: &str, arguments: Value) -> Result<T, SessionError> {
        let rsp = self.client.request(command, arguments)?;
        if !rsp.success {
            return Err(SessionError::Rejected {
                command: command.to_string(),
                message: rsp.error_message(),
            });
        }
        serde_json::from_value(rsp.body.unwrap_or(Value::Null)).map_err(|source| {
            SessionError::Body {
                command: command.to_string(),
                source,
            }
        })
    }
}

impl DebugSession for DapSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn threads(&self) -> Result<Vec<Thread>, SessionError> {
        let body: ThreadsBody = self.call("threads", json!({}))?;
        Ok(body.threads)
    }

    fn stack_trace(
        &self,
        thread_id: i64,
        levels: Option<u32>,
    ) -> Result<Vec<StackFrame>, SessionError> {
        let mut args = json!({"threadId": thread_id, "startFrame": 0});
        if let Some(levels) = levels {
            args["levels"] = json!(levels);
        }
        let body: StackTraceBody = self.call("stackTrace", args)?;
        Ok(body.stack_frames)
    }

    fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, SessionError> {
        let body: ScopesBody = self.call("scopes", json!({"frameId": frame_id}))?;
        Ok(body.scopes)
    }

    fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, SessionError> {
        let body: VariablesBody = self.call(
            "variables",
            json!({"variablesReference": variables_reference}),
        )?;
        Ok(body.variables)
    }

    fn evaluate(
        &self,
        expression: &str,
        frame_id: i64,
        context: EvaluateContext,
    ) -> Result<String, SessionError> {
        let context: &'static str = context.into();
        let body: EvaluateResponse = self.call(
            "evaluate",
            json!({"expression": expression, "frameId": frame_id, "context": context}),
        )?;
        Ok(body.result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Evaluator = Box<dyn Fn(&str, i64, EvaluateContext) -> Result<String, SessionError>>;

    pub(crate) fn rejected(message: &str) -> SessionError {
        SessionError::Rejected {
            command: "evaluate".to_string(),
            message: message.to_string(),
        }
    }

    /// In-memory session with a fixed stack and a scripted evaluator.
    pub(crate) struct ScriptedSession {
        pub id: String,
        pub threads: Vec<Thread>,
        pub frames: HashMap<i64, Vec<StackFrame>>,
        pub scopes: HashMap<i64, Vec<Scope>>,
        pub variables: HashMap<i64, Vec<Variable>>,
        pub fail_threads: bool,
        evaluator: Evaluator,
        pub evaluated: Mutex<Vec<(String, i64, EvaluateContext)>>,
        pub stack_requests: Mutex<Vec<(i64, Option<u32>)>>,
    }

    impl ScriptedSession {
        /// One thread (id 1) with one frame (id 100).
        pub(crate) fn new(
            evaluator: impl Fn(&str, i64, EvaluateContext) -> Result<String, SessionError> + 'static,
        ) -> Self {
            Self {
                id: "session-1".to_string(),
                threads: vec![thread(1)],
                frames: HashMap::from([(1, vec![frame(100)])]),
                scopes: HashMap::new(),
                variables: HashMap::new(),
                fail_threads: false,
                evaluator: Box::new(evaluator),
                evaluated: Mutex::new(vec![]),
                stack_requests: Mutex::new(vec![]),
            }
        }

        pub(crate) fn evaluated(&self) -> Vec<(String, i64, EvaluateContext)> {
            self.evaluated.lock().unwrap().clone()
        }
    }

    pub(crate) fn thread(id: i64) -> Thread {
        Thread {
            id,
            name: format!("thread-{id}"),
        }
    }

    pub(crate) fn frame(id: i64) -> StackFrame {
        StackFrame {
            id,
            name: format!("frame-{id}"),
        }
    }

    pub(crate) fn scope(reference: i64) -> Scope {
        Scope {
            name: "Locals".to_string(),
            variables_reference: reference,
        }
    }

    pub(crate) fn variable(name: &str, type_name: &str) -> Variable {
        Variable {
            name: name.to_string(),
            value: String::new(),
            type_name: Some(type_name.to_string()),
            evaluate_name: Some(name.to_string()),
            variables_reference: 0,
        }
    }

    impl DebugSession for ScriptedSession {
        fn id(&self) -> &str {
            &self.id
        }

        fn threads(&self) -> Result<Vec<Thread>, SessionError> {
            if self.fail_threads {
                return Err(SessionError::Dap(DapError::Closed));
            }
            Ok(self.threads.clone())
        }

        fn stack_trace(
            &self,
            thread_id: i64,
            levels: Option<u32>,
        ) -> Result<Vec<StackFrame>, SessionError> {
            self.stack_requests.lock().unwrap().push((thread_id, levels));
            let frames = self.frames.get(&thread_id).cloned().unwrap_or_default();
            Ok(match levels {
                Some(levels) => frames.into_iter().take(levels as usize).collect(),
                None => frames,
            })
        }

        fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>, SessionError> {
            Ok(self.scopes.get(&frame_id).cloned().unwrap_or_default())
        }

        fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>, SessionError> {
            Ok(self
                .variables
                .get(&variables_reference)
                .cloned()
                .unwrap_or_default())
        }

        fn evaluate(
            &self,
            expression: &str,
            frame_id: i64,
            context: EvaluateContext,
        ) -> Result<String, SessionError> {
            self.evaluated
                .lock()
                .unwrap()
                .push((expression.to_string(), frame_id, context));
            (self.evaluator)(expression, frame_id, context)
        }
    }
}
