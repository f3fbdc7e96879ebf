//! Authentication building blocks
//!
//! Provides:
//! - Credential hashing with Argon2
//! - Session token issuance and validation (HS256 JWT)

pub mod password;
pub mod session;

pub use password::{hash_credential, verify_credential};
pub use session::{extract_bearer_token, Claims, SessionIssuer, SessionToken};
