//! Storage traits and implementations.
//!
//! The `SpanStore` trait defines where the collector sends accepted spans,
//! allowing different implementations (in-memory, database-backed, etc.).

pub mod span_store;

pub use span_store::{InMemorySpanStore, SpanStore, StoreError};
