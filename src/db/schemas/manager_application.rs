//! Manager application schema
//!
//! Links a manager identity to a business application. An approved link
//! is the membership record itself: "which businesses does this manager
//! belong to" is answered by querying approved links.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{ApplicationStatus, Metadata};

/// Collection name for manager applications
pub const MANAGER_APPLICATION_COLLECTION: &str = "manager_applications";

/// Manager application document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ManagerApplicationDoc {
    /// MongoDB ObjectId (auto-generated)
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Business owner who filed the link
    pub owner_identity_id: ObjectId,

    /// Business application the manager is attached to
    pub linked_application_id: ObjectId,

    /// Resolved manager identity. Nullable in the stored shape; every
    /// write path resolves it before inserting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_identity_id: Option<ObjectId>,

    /// Manager's personal address, shared by reference
    pub address_id: ObjectId,

    #[serde(default)]
    pub status: ApplicationStatus,

    /// When the link was decided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,

    /// Administrator identity that decided the link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<ObjectId>,
}

impl ManagerApplicationDoc {
    pub fn new(
        owner_identity_id: ObjectId,
        linked_application_id: ObjectId,
        manager_identity_id: ObjectId,
        address_id: ObjectId,
    ) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            owner_identity_id,
            linked_application_id,
            manager_identity_id: Some(manager_identity_id),
            address_id,
            status: ApplicationStatus::Pending,
            decided_at: None,
            decided_by: None,
        }
    }
}

impl IntoIndexes for ManagerApplicationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "linked_application_id": 1 }, None),
            // Membership lookups by manager identity
            (doc! { "manager_identity_id": 1, "status": 1 }, None),
        ]
    }
}

impl MutMetadata for ManagerApplicationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
