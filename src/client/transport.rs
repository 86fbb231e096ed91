use std::fmt;

use serde_json::Value;

/// A failure reported by a wire client.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    /// HTTP-like status, when the engine answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{status}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportFailure>;

/// The primitives the mapper needs from a search engine client.
///
/// Requests and responses are JSON values in the engine's REST shapes:
///
/// - `get` answers `{"found": bool, "_source": {...}}`; a missing document is
///   `found: false`, not a failure.
/// - `search` takes `{query, sort?, from?, size?, aggs?}` and answers
///   `{"hits": {"total": {"value"}, "hits": [{"_id", "_source"}]}, "aggregations"?}`.
/// - `bulk` takes the ordered list of action headers and payloads.
/// - `count` takes `{query}` and answers `{"count": n}`.
pub trait Transport: Send + Sync {
    fn get(&self, index: &str, id: &str) -> TransportResult<Value>;

    fn search(&self, index: &str, body: &Value) -> TransportResult<Value>;

    fn bulk(&self, body: &[Value]) -> TransportResult<Value>;

    fn count(&self, index: &str, body: &Value) -> TransportResult<Value>;
}
