//! Spanline Shared Library
//!
//! This crate contains the span model and the ingestion machinery shared by
//! the Spanline server and CLI.
//!
//! # Modules
//!
//! - [`models`] - Span and trace data models
//! - [`codec`] - JSON and protobuf span list formats
//! - [`compression`] - gzip transport compression
//! - [`sampler`] - Trace-ID based collector sampling
//! - [`storage`] - Span storage traits and implementations
//! - [`collector`] - Decode, validate, sample, and store
//! - [`ingest`] - The upload pipeline and its completion handle
//!
//! # Example
//!
//! ```
//! use shared::models::Span;
//!
//! let span = Span::new("463ac35c9f6413ad", "a2fb4a1d1a96d312", "get /", "frontend")
//!     .with_attribute("http.method", "GET");
//!
//! assert!(span.validate_span().is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod collector;
pub mod compression;
pub mod ingest;
pub mod models;
pub mod sampler;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use bytes;
pub use chrono;
pub use serde;
pub use serde_json;
