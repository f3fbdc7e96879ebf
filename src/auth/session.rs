//! Session token handling for authenticated principals
//!
//! Successful authentication issues an HS256-signed JWT carrying the
//! identity id, email and role. The token is opaque to callers; transport
//! layers attach it however they like.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::db::schemas::{IdentityDoc, Role};
use crate::types::{RegistrarError, Result};

/// Payload stored in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id (hex ObjectId)
    pub sub: String,
    /// Login email
    pub email: String,
    /// Role at issuance time
    pub role: Role,
    /// Token id, for audit trails and future revocation
    pub jti: String,
    /// Issued at, seconds since the epoch
    pub iat: u64,
    /// Expiry, seconds since the epoch
    pub exp: u64,
}

/// Issued session descriptor
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    /// Expiry, seconds since the epoch
    pub expires_at: u64,
}

/// Session token issuer and validator
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
    expiry_seconds: u64,
}

impl SessionIssuer {
    /// Create a new issuer. Rejects empty or short signing secrets.
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(RegistrarError::Credential(
                "session signing secret must be set".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(RegistrarError::Credential(
                "session signing secret must be at least 32 bytes".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Issuer for dev mode, with a fixed insecure secret
    pub fn new_dev() -> Self {
        Self {
            secret: "insecure-dev-session-secret-do-not-deploy-1234".into(),
            expiry_seconds: 3600,
        }
    }

    /// Issue a session token for an authenticated identity
    pub fn issue(&self, identity: &IdentityDoc) -> Result<SessionToken> {
        let identity_id = identity
            .id
            .ok_or_else(|| RegistrarError::Credential("Identity has no id".into()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RegistrarError::Credential(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: identity_id.to_hex(),
            email: identity.email.clone(),
            role: identity.role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| RegistrarError::Credential(format!("Failed to sign session token: {}", e)))?;

        Ok(SessionToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify and decode a session token
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let msg = match err.kind() {
                ErrorKind::ExpiredSignature => "Session expired",
                ErrorKind::InvalidToken => "Invalid session token",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Session validation failed",
            };
            RegistrarError::Credential(msg.into())
        })
    }
}

/// Extract the token from an Authorization header value, with or
/// without the "Bearer " scheme prefix.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    // A bare token carries no spaces; anything else is a malformed scheme
    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
