//! `MeetsMatch` Core Library
//!
//! Shared functionality for `MeetsMatch` components:
//! - Domain model for users, preferences, and matches
//! - Candidate scoring (proximity, interests, preferences)
//! - Pure match lifecycle transition rules
//! - Configuration resolution and hierarchy
//! - Shared `SQLite` helpers and tracing setup

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod scoring;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    Gender, Location, Match, MatchAction, MatchScore, MatchStatus, Participant, Preferences, User,
};
