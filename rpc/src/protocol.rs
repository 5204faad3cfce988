//! JSON-RPC 2.0 wire types and the demultiplexing rule.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use jamscan_types::Block;

/// Methods this client issues.
pub mod method {
    /// Subscribe to a notification topic: params `[topic]`.
    pub const SUBSCRIBE: &str = "jam.Subscribe";
    /// Unsubscribe from a notification topic: params `[topic]`.
    pub const UNSUBSCRIBE: &str = "jam.Unsubscribe";
    /// Fetch the state document for a block: params `[header_hash_hex]`,
    /// result is a JSON document or `null` when the node has nothing.
    pub const GET_STATE: &str = "jam.GetState";
}

/// Notification topics the node publishes.
pub mod topic {
    /// A newly imported block: params carry the header hash and block payload.
    pub const NEW_BLOCK: &str = "jam.NewBlock";
}

/// An outbound JSON-RPC request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// The error object of a failed call response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// Any inbound frame.
///
/// The demux rule: a frame whose `id` matches a
/// pending call resolves that call; a frame without a matching `id` but with
/// a `method` is a notification for that topic; anything else is malformed
/// and dropped.
#[derive(Clone, Debug, Deserialize)]
pub struct Frame {
    pub id: Option<u64>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    pub result: Option<Value>,
    pub error: Option<ErrorObject>,
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Params of a [`topic::NEW_BLOCK`] notification. The original explorer's
/// node sends camelCase, so that spelling is accepted as an alias.
#[derive(Clone, Debug, Deserialize)]
pub struct NewBlockParams {
    #[serde(alias = "headerHash")]
    pub header_hash: String,
    pub block: Block,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_jsonrpc_shape() {
        let request = Request::new(7, method::GET_STATE, json!(["0xabc"]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "jam.GetState", "params": ["0xabc"]})
        );
    }

    #[test]
    fn response_frame_carries_id_and_result() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#).unwrap();
        assert_eq!(frame.id, Some(3));
        assert_eq!(frame.result, Some(json!({"ok": true})));
        assert!(frame.error.is_none());
        assert!(frame.method.is_none());
    }

    #[test]
    fn error_frame_carries_error_object() {
        let frame =
            Frame::parse(r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"nope"}}"#)
                .unwrap();
        let err = frame.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn notification_frame_has_method_and_no_id() {
        let frame = Frame::parse(
            r#"{"jsonrpc":"2.0","method":"jam.NewBlock","params":{"header_hash":"0xaa","block":{}}}"#,
        )
        .unwrap();
        assert_eq!(frame.id, None);
        assert_eq!(frame.method.as_deref(), Some("jam.NewBlock"));
    }

    #[test]
    fn new_block_params_accept_camel_case() {
        let hex = format!("0x{}", "ab".repeat(32));
        let params: NewBlockParams =
            serde_json::from_value(json!({"headerHash": &hex, "block": {"header": {"slot": 1}}}))
                .unwrap();
        assert_eq!(params.header_hash, hex);
        assert_eq!(params.block.header.slot, 1);
    }
}
