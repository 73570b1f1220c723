//! Request and Response models for the host HTTP surface
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{LookupParams, ModeRequest, PopularParams, PutRequest};
pub use responses::{
    ClearResponse, ConnectivityResponse, ErrorResponse, HealthResponse, LookupResponse,
    PopularResponse, ProbeResponse, PutResponse,
};
