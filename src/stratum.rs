use super::*;

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Stratum clients send numeric ids, string ids, or null; keep whatever came
/// in and echo it back verbatim.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Display, Clone)]
#[serde(untagged)]
pub(crate) enum Id {
    Null,
    Number(u64),
    String(String),
}

impl Default for Id {
    fn default() -> Self {
        Id::Null
    }
}

/// Inbound request. The eth-proxy stratum dialect carries the worker name as
/// a top-level field next to the JSON-RPC triple.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub(crate) struct Request {
    #[serde(default)]
    pub(crate) id: Id,
    pub(crate) method: String,
    #[serde(default)]
    pub(crate) params: Value,
    #[serde(default)]
    pub(crate) worker: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub(crate) struct JsonRpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Response {
    pub(crate) id: Id,
    pub(crate) jsonrpc: &'static str,
    pub(crate) result: Option<Value>,
    pub(crate) error: Option<JsonRpcError>,
}

impl Response {
    pub(crate) fn ok(id: Id, result: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn error(id: Id, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Server-initiated job push. The zero id is load-bearing: some miners drop
/// push messages without one.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct PushMessage {
    pub(crate) id: u64,
    pub(crate) jsonrpc: &'static str,
    pub(crate) result: Value,
}

impl PushMessage {
    pub(crate) fn new(result: Value) -> Self {
        Self {
            id: 0,
            jsonrpc: JSONRPC_VERSION,
            result,
        }
    }
}

/// Job payload pushed to miners and returned from getwork, ordered:
/// `[header, seed, shareTargetHex, heightHex]`. The third element is the
/// share-difficulty boundary, zero-padded to 64 hex digits.
pub(crate) fn job_payload(template: &BlockTemplate, share_difficulty: u64) -> Value {
    let boundary = target(U256::from(share_difficulty));

    json!([
        template.header,
        template.seed,
        format!("0x{}", hex::encode(boundary.to_big_endian())),
        format!("0x{:x}", template.height),
    ])
}
