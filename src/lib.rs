pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod fraud;
pub mod iban;
pub mod kv;
pub mod observability;
pub mod storage;

pub use domain::Decision;
pub use error::AuthError;
pub use fraud::{CheckOutcome, CheckRequest, FraudEngine};
pub use kv::KvStore;
