//! Identity document schema
//!
//! A login principal: unique email, hashed credential, role, verification
//! flag. Biographical data lives in the profile collection, keyed back to
//! the identity.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for identities
pub const IDENTITY_COLLECTION: &str = "identities";

/// Principal role. Closed set: adding a role means handling it wherever
/// roles are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Consumer,
    BusinessOwner,
    BusinessManager,
    Admin,
    Operations,
    SocialMedia,
}

impl Role {
    /// Whether sign-in is gated on administrator review.
    pub fn requires_review(&self) -> bool {
        matches!(self, Role::BusinessOwner | Role::BusinessManager)
    }

    /// Whether the role is a back-office staff role.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Operations | Role::SocialMedia)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consumer => "consumer",
            Role::BusinessOwner => "business_owner",
            Role::BusinessManager => "business_manager",
            Role::Admin => "admin",
            Role::Operations => "operations",
            Role::SocialMedia => "social_media",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role an administrator may grant when approving a business application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovedRole {
    BusinessOwner,
    BusinessManager,
}

impl From<ApprovedRole> for Role {
    fn from(role: ApprovedRole) -> Self {
        match role {
            ApprovedRole::BusinessOwner => Role::BusinessOwner,
            ApprovedRole::BusinessManager => Role::BusinessManager,
        }
    }
}

/// Canonical form for stored and queried emails.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Identity document stored in the registry.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IdentityDoc {
    /// MongoDB ObjectId (auto-generated)
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Login email, stored trimmed and lowercased. Unique across the registry.
    pub email: String,

    /// Contact phone number
    pub phone: String,

    /// Argon2 PHC string. Plaintext credentials never reach the store.
    pub credential_hash: String,

    /// Principal role
    #[serde(default)]
    pub role: Role,

    /// Whether the identity has passed administrator review
    #[serde(default)]
    pub verified: bool,
}

impl IdentityDoc {
    pub fn new(email: String, phone: String, credential_hash: String, role: Role, verified: bool) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            email,
            phone,
            credential_hash,
            role,
            verified,
        }
    }
}

impl IntoIndexes for IdentityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on email - the registry-wide uniqueness guarantee
            (
                doc! { "email": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
            (doc! { "role": 1 }, None),
        ]
    }
}

impl MutMetadata for IdentityDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
