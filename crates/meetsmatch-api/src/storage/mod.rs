//! `SQLite` storage for the matching service.
//!
//! Provides persistence for user snapshots and pairwise matches.

mod db;
mod models;
mod queries_matches;
mod queries_users;


pub use db::{DatabaseError, MatchDatabase};
pub use models::{MatchRow, UserRow, VersionedMatch};
