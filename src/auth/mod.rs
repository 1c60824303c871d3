pub mod jwt;
pub mod password;
pub mod service;
pub mod tokens;

pub use jwt::{JwtCodec, JwtError};
pub use service::{AuthService, LoginTokens};
pub use tokens::TokenService;
