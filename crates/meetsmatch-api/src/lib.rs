//! `MeetsMatch` Match Service Library
//!
//! Core functionality for the match service:
//! - `SQLite` storage for user snapshots and matches
//! - Candidate discovery and scoring
//! - Atomic match lifecycle (create, like, dislike, skip)
//! - Response cache, per-key rate limiting, and activity tracking
//! - The `MatchService` gRPC surface

pub mod activity;
pub mod cache;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod ratelimit;
pub mod server;
pub mod storage;
pub mod users;
