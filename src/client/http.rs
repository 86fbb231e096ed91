//! Blocking REST transport.
//!
//! Talks to an Elasticsearch-compatible endpoint. Only the first configured
//! host is used; there is no retry or connection pooling policy beyond what
//! `reqwest` does on its own.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Certificate, StatusCode, Url};
use serde_json::{Value, json};

use crate::client::transport::{Transport, TransportFailure, TransportResult};
use crate::config::ClientConfig;
use crate::error::{OdmError, Result};

const META_HEADER: &str = "x-elastic-client-meta";

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let host = config
            .hosts
            .first()
            .ok_or_else(|| OdmError::configuration("At least one host must be configured"))?;
        let base = Url::parse(host)
            .map_err(|e| OdmError::configuration(format!("Invalid host '{host}': {e}")))?;

        let mut headers = HeaderMap::new();
        if config.elastic_meta_header {
            headers.insert(
                META_HEADER,
                HeaderValue::from_static(concat!("es=", env!("CARGO_PKG_VERSION"), ",rs=1")),
            );
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(path) = &config.ca_bundle_path {
            let pem = std::fs::read(path)?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| {
                OdmError::configuration(format!("Invalid CA bundle '{}': {e}", path.display()))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| OdmError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportFailure::new(None, format!("'{}' cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> TransportResult<(StatusCode, Value)> {
        let response = request
            .send()
            .map_err(|e| TransportFailure::new(e.status().map(|s| s.as_u16()), e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| TransportFailure::new(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(TransportFailure::new(Some(status.as_u16()), text));
        }

        let body = serde_json::from_str(&text).map_err(|e| {
            TransportFailure::new(Some(status.as_u16()), format!("invalid JSON response: {e}"))
        })?;
        Ok((status, body))
    }

    fn send_expecting_success(&self, request: RequestBuilder) -> TransportResult<Value> {
        let (status, body) = self.send(request)?;
        if status == StatusCode::NOT_FOUND {
            return Err(TransportFailure::new(Some(status.as_u16()), body.to_string()));
        }
        Ok(body)
    }
}

impl Transport for HttpTransport {
    fn get(&self, index: &str, id: &str) -> TransportResult<Value> {
        let url = self.url(&[index, "_doc", id])?;
        let (status, body) = self.send(self.client.get(url))?;
        if status == StatusCode::NOT_FOUND {
            // Missing index or document.
            return Ok(json!({"_index": index, "_id": id, "found": false}));
        }
        Ok(body)
    }

    fn search(&self, index: &str, body: &Value) -> TransportResult<Value> {
        let url = self.url(&[index, "_search"])?;
        self.send_expecting_success(self.client.post(url).json(body))
    }

    fn bulk(&self, body: &[Value]) -> TransportResult<Value> {
        let mut ndjson = String::new();
        for line in body {
            ndjson.push_str(&line.to_string());
            ndjson.push('\n');
        }

        let url = self.url(&["_bulk"])?;
        self.send_expecting_success(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(ndjson),
        )
    }

    fn count(&self, index: &str, body: &Value) -> TransportResult<Value> {
        let url = self.url(&[index, "_count"])?;
        self.send_expecting_success(self.client.post(url).json(body))
    }
}
