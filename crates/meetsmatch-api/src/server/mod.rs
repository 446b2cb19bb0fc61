//! gRPC surface of the match service.

mod convert;
pub mod match_svc;

#[cfg(test)]
mod match_svc_tests;

pub use match_svc::MatchServiceImpl;
