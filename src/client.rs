//! Wire client layer.
//!
//! # Module Structure
//!
//! - `transport`: the [`Transport`] trait every search-engine client implements
//! - `wrapper`: [`ClientWrapper`], error wrapping and [`QueryMetrics`] capture
//! - `memory`: [`MemoryTransport`], an in-process engine for tests and demos
//! - `http`: [`HttpTransport`] over the REST API (feature `http`)

pub mod memory;
pub mod transport;
pub mod wrapper;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use memory::MemoryTransport;
pub use transport::{Transport, TransportFailure, TransportResult};
pub use wrapper::{ClientWrapper, QueryMetrics};
