pub mod decision;
pub mod token;
pub mod transaction;
pub mod user;
pub mod vendor;

pub use decision::{Decision, ALLOW_THRESHOLD, REVIEW_THRESHOLD};
pub use token::{Claims, TokenKind};
pub use transaction::NewTransaction;
pub use user::{NewUser, User};
pub use vendor::{RiskBucket, Vendor};
