//! MeetsMatch Protocol Buffers
//!
//! Generated protobuf code for the MeetsMatch gRPC API.
//!
//! This crate contains:
//! - `MatchService` for candidate discovery and the match lifecycle
//! - The `User` and `Match` wire messages shared by every client

#![allow(clippy::derive_partial_eq_without_eq)]

/// MeetsMatch v1 API definitions.
///
/// All generated types and services are included here.
pub mod v1 {
    tonic::include_proto!("meetsmatch.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;

// Re-export prost_types for downstream crates that need Timestamp conversion
pub use prost_types;
