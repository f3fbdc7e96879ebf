//! Credential hashing and verification using Argon2
//!
//! Uses argon2id variant with recommended parameters. The store only ever
//! sees PHC-formatted hashes; plaintext never leaves the request path.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::{RegistrarError, Result};

/// Hash a credential using Argon2id
///
/// The returned PHC string carries the salt and parameters, so nothing
/// else needs to be stored alongside it.
pub fn hash_credential(credential: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RegistrarError::Credential(format!("Failed to hash credential: {e}")))
}

/// Verify a credential attempt against a stored hash
///
/// Returns true if the attempt matches the hash.
pub fn verify_credential(attempt: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| RegistrarError::Credential(format!("Invalid credential hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(attempt.as_bytes(), &parsed_hash)
        .is_ok())
}
