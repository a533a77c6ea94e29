use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DAP request envelope.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub seq: i64,
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub command: &'a str,
    pub arguments: Value,
}

/// Response to a request sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub seq: i64,
    pub request_seq: i64,
    pub success: bool,
    pub command: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Response {
    /// Human readable failure reason.
    ///
    /// Adapters put the interesting part either into `body.error.format` (debugpy does this
    /// for evaluation errors) or into `message`.
    pub fn error_message(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| b.pointer("/error/format"))
            .and_then(Value::as_str)
            .or(self.message.as_deref())
            .unwrap_or("unknown error")
            .to_string()
    }
}

/// Event emitted by the adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq: i64,
    pub event: String,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Event {
    /// True for events after which the debuggee is gone.
    pub fn is_termination(&self) -> bool {
        matches!(self.event.as_str(), "terminated" | "exited")
    }
}

/// Request sent by the adapter to the client (`runInTerminal`, `startDebugging`).
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseRequest {
    pub seq: i64,
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    Request(ReverseRequest),
    Response(Response),
    Event(Event),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Thread {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StackFrame {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default)]
    pub name: String,
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub evaluate_name: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub result: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThreadsBody {
    pub threads: Vec<Thread>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StackTraceBody {
    pub stack_frames: Vec<StackFrame>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScopesBody {
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariablesBody {
    pub variables: Vec<Variable>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_kinds() {
        let msg: ProtocolMessage = serde_json::from_value(json!({
            "seq": 3, "type": "response", "request_seq": 2, "success": true,
            "command": "threads", "body": {"threads": [{"id": 1, "name": "MainThread"}]}
        }))
        .unwrap();
        let ProtocolMessage::Response(rsp) = msg else {
            panic!("response expected");
        };
        assert_eq!(rsp.request_seq, 2);
        let body: ThreadsBody = serde_json::from_value(rsp.body.unwrap()).unwrap();
        assert_eq!(body.threads[0].id, 1);

        let msg: ProtocolMessage = serde_json::from_value(json!({
            "seq": 4, "type": "event", "event": "terminated"
        }))
        .unwrap();
        assert!(matches!(msg, ProtocolMessage::Event(ev) if ev.is_termination()));

        let msg: ProtocolMessage = serde_json::from_value(json!({
            "seq": 5, "type": "request", "command": "runInTerminal", "arguments": {}
        }))
        .unwrap();
        assert!(matches!(msg, ProtocolMessage::Request(r) if r.command == "runInTerminal"));
    }

    #[test]
    fn test_error_message() {
        let rsp: Response = serde_json::from_value(json!({
            "request_seq": 9, "success": false, "command": "evaluate",
            "message": "Unable to evaluate",
            "body": {"error": {"id": 1, "format": "NameError: name 'pts' is not defined"}}
        }))
        .unwrap();
        assert_eq!(rsp.error_message(), "NameError: name 'pts' is not defined");

        let rsp: Response = serde_json::from_value(json!({
            "request_seq": 9, "success": false, "command": "threads", "message": "not stopped"
        }))
        .unwrap();
        assert_eq!(rsp.error_message(), "not stopped");
    }

    #[test]
    fn test_variable_body() {
        let body: VariablesBody = serde_json::from_value(json!({"variables": [
            {"name": "pts", "value": "array(...)", "type": "ndarray",
             "evaluateName": "pts", "variablesReference": 12}
        ]}))
        .unwrap();
        assert_eq!(body.variables[0].type_name.as_deref(), Some("ndarray"));
        assert_eq!(body.variables[0].evaluate_name.as_deref(), Some("pts"));
    }
}
