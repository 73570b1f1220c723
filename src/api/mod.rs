//! API Module
//!
//! HTTP handlers and routing that expose the cache to the host process.
//!
//! # Endpoints
//! - `GET /cache` - Look up a cached result
//! - `PUT /cache` - Cache a producer result
//! - `DELETE /cache` - Clear the cache
//! - `GET /cache/popular` - Most used queries
//! - `GET /metrics` - Cache and mode counters
//! - `GET /mode` / `PUT /mode` - Current mode / operator override
//! - `POST /probe` - Probe connectivity now
//! - `GET /connectivity` - Latest probe states
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
