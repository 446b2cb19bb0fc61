//! Cache layer: typed payloads over a pluggable key-value store.

mod layer;
mod store;

pub use layer::{
    CacheLayer, CacheStats, TtlClass, candidates_key, common_response_key, feature_key,
    match_key, matches_key, response_key, user_key,
};
pub use store::{CacheError, KvStore, MemoryStore, glob_match};
