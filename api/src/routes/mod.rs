//! API route definitions.
//!
//! This module organizes all HTTP routes for the Spanline API server.

mod health;
mod spans;

pub use health::health_routes;
pub use spans::span_routes;
