//! Business application schema
//!
//! A business filed under an owner identity, waiting in the admin queue.
//! Status moves out of `Pending` exactly once; decided rows keep their
//! verdict, decider and timestamp for audit.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for business applications
pub const BUSINESS_APPLICATION_COLLECTION: &str = "business_applications";

/// Application lifecycle. Monotone: nothing transitions out of
/// `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision applied to a pending application.
#[derive(Debug, Clone)]
pub enum Verdict {
    Approved,
    Rejected { reason: String },
}

impl Verdict {
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Verdict::Approved => ApplicationStatus::Approved,
            Verdict::Rejected { .. } => ApplicationStatus::Rejected,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Verdict::Approved => None,
            Verdict::Rejected { reason } => Some(reason),
        }
    }
}

/// Business application document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BusinessApplicationDoc {
    /// MongoDB ObjectId (auto-generated)
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner identity the business is filed under
    pub owner_identity_id: ObjectId,

    pub business_name: String,
    pub legal_name: String,

    /// Business address. Written before this row ever exists.
    pub address_id: ObjectId,

    pub contact_email: String,
    pub contact_phone: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_certificate_number: Option<String>,

    #[serde(default)]
    pub status: ApplicationStatus,

    /// Reason recorded on rejection, surfaced to the applicant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// When the application was decided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,

    /// Administrator identity that decided the application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<ObjectId>,
}

impl IntoIndexes for BusinessApplicationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "owner_identity_id": 1 }, None),
            // The admin queue reads by status
            (doc! { "status": 1 }, None),
        ]
    }
}

impl MutMetadata for BusinessApplicationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
