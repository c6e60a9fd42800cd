pub mod jwt;
pub mod password;
pub mod tokens;
pub mod totp;

pub use jwt::{Claims, JwtProvider, TokenPurpose};
