use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::client::transport::{Transport, TransportResult};
use crate::error::{OdmError, Result};

/// Timing and hit count of the last wire call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryMetrics {
    pub execution_time: Duration,
    /// `hits.total.value` of a search response, 0 for any other call.
    pub total_results: u64,
}

/// Wraps a [`Transport`], turning its failures into [`OdmError::Transport`]
/// and recording [`QueryMetrics`] for every successful call.
pub struct ClientWrapper {
    transport: Arc<dyn Transport>,
    last_metrics: Mutex<Option<QueryMetrics>>,
}

impl ClientWrapper {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            last_metrics: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn last_query_metrics(&self) -> Option<QueryMetrics> {
        *self.last_metrics.lock()
    }

    pub fn get(&self, index: &str, id: &str) -> Result<Value> {
        self.execute("get", |t| t.get(index, id))
    }

    pub fn search(&self, index: &str, body: &Value) -> Result<Value> {
        self.execute("search", |t| t.search(index, body))
    }

    pub fn bulk(&self, body: &[Value]) -> Result<Value> {
        self.execute("bulk", |t| t.bulk(body))
    }

    pub fn count(&self, index: &str, body: &Value) -> Result<Value> {
        self.execute("count", |t| t.count(index, body))
    }

    fn execute<F>(&self, operation: &str, call: F) -> Result<Value>
    where
        F: FnOnce(&dyn Transport) -> TransportResult<Value>,
    {
        let start = Instant::now();
        let response = call(self.transport.as_ref()).map_err(|failure| {
            OdmError::transport(operation.to_uppercase(), failure.status, failure.message)
        })?;

        let metrics = QueryMetrics {
            execution_time: start.elapsed(),
            total_results: total_hits(&response),
        };
        log::trace!(
            "{operation} took {:?} ({} results)",
            metrics.execution_time,
            metrics.total_results
        );
        *self.last_metrics.lock() = Some(metrics);

        Ok(response)
    }
}

fn total_hits(response: &Value) -> u64 {
    response
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
