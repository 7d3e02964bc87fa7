//! IPC protocol message types
//!
//! Defines the request/response format for client ↔ daemon communication.
//! Each message is one length-prefixed JSON body (see [`super::transport`]).
//!
//! A request is `{"op": <name>, "args": {...}}`; a response is either
//! `{"ok": <payload>}` or `{"err": {"kind": ..., "message": ...}}`.
//!
//! Decode failures are split in two so the daemon can keep a connection open
//! when only the body is bad: [`Error::UnknownOperation`] for a well-formed
//! envelope whose `op` this build does not know (protocol skew), and
//! [`Error::MalformedMessage`] for everything else. Framing errors never reach
//! this module; they close the connection in the transport layer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::RpcError;
use crate::common::{Error, Result};

/// Protocol version spoken by this build
///
/// Bumped whenever an operation is added, removed, or changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Requests a client can send to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Request {
    // === Server state ===
    /// Protocol version of the daemon
    Version,

    /// Process id of the daemon
    Pid,

    /// Ask the daemon to stop accepting connections and exit
    Shutdown,

    // === Shared variables ===
    SharedVar { name: String },

    SetSharedVar { name: String, value: String },

    DelSharedVar { name: String },

    // === Command history ===
    NextCmdSeq,

    AddCmd { text: String },

    DelCmd { seq: u64 },

    Cmd { seq: u64 },

    /// Commands with `from <= seq < upto`
    Cmds { from: u64, upto: u64 },

    NextCmd { from: u64, prefix: String },

    PrevCmd { upto: u64, prefix: String },

    // === Directory history ===
    AddDir { path: String, inc_factor: f64 },

    DelDir { path: String },

    Dirs { blacklist: Vec<String> },
}

impl Request {
    /// Every operation tag this build understands
    pub const OPERATIONS: &'static [&'static str] = &[
        "version",
        "pid",
        "shutdown",
        "shared_var",
        "set_shared_var",
        "del_shared_var",
        "next_cmd_seq",
        "add_cmd",
        "del_cmd",
        "cmd",
        "cmds",
        "next_cmd",
        "prev_cmd",
        "add_dir",
        "del_dir",
        "dirs",
    ];

    /// Operation tag, as it appears on the wire
    pub fn op(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Pid => "pid",
            Self::Shutdown => "shutdown",
            Self::SharedVar { .. } => "shared_var",
            Self::SetSharedVar { .. } => "set_shared_var",
            Self::DelSharedVar { .. } => "del_shared_var",
            Self::NextCmdSeq => "next_cmd_seq",
            Self::AddCmd { .. } => "add_cmd",
            Self::DelCmd { .. } => "del_cmd",
            Self::Cmd { .. } => "cmd",
            Self::Cmds { .. } => "cmds",
            Self::NextCmd { .. } => "next_cmd",
            Self::PrevCmd { .. } => "prev_cmd",
            Self::AddDir { .. } => "add_dir",
            Self::DelDir { .. } => "del_dir",
            Self::Dirs { .. } => "dirs",
        }
    }
}

/// Response from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Operation-specific payload
    Ok(Value),
    /// Structured failure
    Err(RpcError),
}

impl Response {
    /// Create a success response from any serializable payload
    pub fn success<T: Serialize>(payload: &T) -> Result<Self> {
        let value = serde_json::to_value(payload)
            .map_err(|e| Error::Internal(format!("failed to encode payload: {e}")))?;
        Ok(Self::Ok(value))
    }

    /// Create a success response with no data
    pub fn ack() -> Self {
        Self::Ok(Value::Null)
    }

    /// Create an error response
    pub fn error(error: &Error) -> Self {
        Self::Err(RpcError::from(error))
    }

    /// Convert into the typed payload, or the error the daemon reported
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Ok(value) => serde_json::from_value(value)
                .map_err(|e| Error::MalformedMessage(format!("unexpected payload: {e}"))),
            Self::Err(e) => Err(e.into()),
        }
    }
}

/// Encode a request body
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    serde_json::to_vec(request)
        .map_err(|e| Error::Internal(format!("failed to encode request: {e}")))
}

/// Decode a request body, telling unknown operations apart from garbage
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedMessage(e.to_string()))?;

    let op = value
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedMessage("missing 'op' tag".to_string()))?
        .to_string();

    if !Request::OPERATIONS.contains(&op.as_str()) {
        return Err(Error::UnknownOperation(op));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::MalformedMessage(format!("bad arguments for '{op}': {e}")))
}

/// Encode a response body
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    serde_json::to_vec(response)
        .map_err(|e| Error::Internal(format!("failed to encode response: {e}")))
}

/// Decode a response body
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    serde_json::from_slice(bytes).map_err(|e| Error::MalformedMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorKind;
    use crate::store::Cmd;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let bytes = encode_request(&Request::SetSharedVar {
            name: "foo".to_string(),
            value: "bar".to_string(),
        })
        .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"op": "set_shared_var", "args": {"name": "foo", "value": "bar"}})
        );

        let bytes = encode_request(&Request::Version).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["op"], "version");
    }

    #[test]
    fn test_decode_argumentless_request() {
        let request = decode_request(br#"{"op": "pid"}"#).unwrap();
        assert_eq!(request, Request::Pid);
    }

    #[test]
    fn test_operations_table_matches_tags() {
        let samples = [
            Request::Version,
            Request::Pid,
            Request::Shutdown,
            Request::SharedVar {
                name: String::new(),
            },
            Request::SetSharedVar {
                name: String::new(),
                value: String::new(),
            },
            Request::DelSharedVar {
                name: String::new(),
            },
            Request::NextCmdSeq,
            Request::AddCmd {
                text: String::new(),
            },
            Request::DelCmd { seq: 0 },
            Request::Cmd { seq: 0 },
            Request::Cmds { from: 0, upto: 0 },
            Request::NextCmd {
                from: 0,
                prefix: String::new(),
            },
            Request::PrevCmd {
                upto: 0,
                prefix: String::new(),
            },
            Request::AddDir {
                path: String::new(),
                inc_factor: 1.0,
            },
            Request::DelDir {
                path: String::new(),
            },
            Request::Dirs {
                blacklist: Vec::new(),
            },
        ];
        assert_eq!(samples.len(), Request::OPERATIONS.len());

        for request in samples {
            let value: Value = serde_json::to_value(&request).unwrap();
            assert_eq!(value["op"], request.op());
            assert!(Request::OPERATIONS.contains(&request.op()));
        }
    }

    #[test]
    fn test_unknown_operation() {
        let err = decode_request(br#"{"op": "frobnicate", "args": {"x": 1}}"#).unwrap_err();
        match err {
            Error::UnknownOperation(op) => assert_eq!(op, "frobnicate"),
            other => panic!("Expected UnknownOperation, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_bodies() {
        for body in [
            &b"not json"[..],
            br#"{"args": {}}"#,
            br#"{"op": 7}"#,
            br#"{"op": "add_cmd", "args": {"txt": "ls"}}"#,
            br#"{"op": "del_cmd", "args": {"seq": -1}}"#,
        ] {
            assert!(
                matches!(decode_request(body), Err(Error::MalformedMessage(_))),
                "body {:?} should be malformed",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_typed_response_payload() {
        let cmd = Cmd {
            seq: 3,
            text: "ls".to_string(),
        };
        let bytes = encode_response(&Response::success(&cmd).unwrap()).unwrap();
        let decoded: Cmd = decode_response(&bytes).unwrap().into_result().unwrap();
        assert_eq!(decoded, cmd);

        let bytes = encode_response(&Response::ack()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"ok": null}));
        let () = decode_response(&bytes).unwrap().into_result().unwrap();
    }

    #[test]
    fn test_error_response_maps_back() {
        let response = Response::error(&Error::NoSuchVariable("missing".to_string()));
        let bytes = encode_response(&response).unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["err"]["kind"], "no_such_variable");

        let err = decode_response(&bytes)
            .unwrap()
            .into_result::<String>()
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchVariable(name) if name == "missing"));
    }

    #[test]
    fn test_unknown_error_kind_from_newer_daemon() {
        let bytes = br#"{"err": {"kind": "quota_exceeded", "message": "too much"}}"#;
        let response = decode_response(bytes).unwrap();
        match response {
            Response::Err(e) => assert_eq!(e.kind, ErrorKind::Internal),
            other => panic!("Expected error response, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_type_mismatch_is_malformed() {
        let err = Response::Ok(json!("not a number"))
            .into_result::<u64>()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }
}
