pub mod client;
pub mod edge;
pub mod request;
pub mod response;
pub mod scoring;

pub use client::ScoringClient;
pub use edge::{edge_router, EdgeState};
pub use scoring::{scoring_router, ScoringState};
