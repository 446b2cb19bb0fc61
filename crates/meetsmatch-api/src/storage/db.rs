//! `SQLite` database for the matching service.

pub use meetsmatch_core::db::DatabaseError;

meetsmatch_core::define_database!(MatchDatabase, "Match database migrations complete");
