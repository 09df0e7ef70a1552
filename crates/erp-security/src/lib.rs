//! # ERP Security
//! 
//! Security utilities: JWT, password hashing, webhook signatures.

pub mod jwt;
pub mod password;
pub mod signature;

pub use jwt::{Claims, JwtError, JwtService, TokenPair};
pub use password::{PasswordError, PasswordService};
