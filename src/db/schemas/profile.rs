//! Applicant profile schema
//!
//! Biographical data attached 1:1 to an identity. Login-critical fields
//! (email, credential hash, role, verification) stay on the identity and
//! are not reachable through profile updates.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{AddressInput, Metadata};

/// Collection name for profiles
pub const PROFILE_COLLECTION: &str = "profiles";

/// Which registration path produced the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    Consumer,
    Owner,
    Manager,
}

/// Profile document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProfileDoc {
    /// MongoDB ObjectId (auto-generated)
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Identity this profile belongs to (1:1)
    pub identity_id: ObjectId,

    #[serde(default)]
    pub kind: ProfileKind,

    pub first_name: String,
    pub last_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,

    /// Government id number, collected on the owner and manager paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id_number: Option<String>,

    /// Opaque reference to an uploaded id document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id_image_ref: Option<String>,

    /// Personal address, shared by reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<ObjectId>,

    /// Accumulated loyalty points. Never negative.
    #[serde(default)]
    pub loyalty_points: i64,
}

impl ProfileDoc {
    pub fn new(identity_id: ObjectId, kind: ProfileKind, first_name: String, last_name: String) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            identity_id,
            kind,
            first_name,
            last_name,
            date_of_birth: None,
            national_id_number: None,
            national_id_image_ref: None,
            address_id: None,
            loyalty_points: 0,
        }
    }

    pub fn with_date_of_birth(mut self, date_of_birth: Option<NaiveDate>) -> Self {
        self.date_of_birth = date_of_birth;
        self
    }

    pub fn with_national_id(
        mut self,
        national_id_number: Option<String>,
        national_id_image_ref: Option<String>,
    ) -> Self {
        self.national_id_number = national_id_number;
        self.national_id_image_ref = national_id_image_ref;
        self
    }
}

/// Field-wise profile change set. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub national_id_number: Option<String>,
    #[serde(default)]
    pub national_id_image_ref: Option<String>,
    /// Replacement address. Inserted as a new row; the old row survives
    /// for any other referrer.
    #[serde(default)]
    pub address: Option<AddressInput>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.date_of_birth.is_none()
            && self.national_id_number.is_none()
            && self.national_id_image_ref.is_none()
            && self.address.is_none()
    }
}

impl IntoIndexes for ProfileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One profile per identity
            (
                doc! { "identity_id": 1 },
                Some(IndexOptions::builder().unique(true).build()),
            ),
        ]
    }
}

impl MutMetadata for ProfileDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_change_set() {
        assert!(ProfileChanges::default().is_empty());

        let changes = ProfileChanges {
            phone: Some("+20100000000".to_string()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_builder_carries_optional_fields() {
        let profile = ProfileDoc::new(
            ObjectId::new(),
            ProfileKind::Owner,
            "Mona".to_string(),
            "Hassan".to_string(),
        )
        .with_date_of_birth(NaiveDate::from_ymd_opt(1990, 3, 14))
        .with_national_id(Some("29003141234567".to_string()), None);

        assert_eq!(profile.kind, ProfileKind::Owner);
        assert!(profile.date_of_birth.is_some());
        assert!(profile.national_id_number.is_some());
        assert!(profile.national_id_image_ref.is_none());
        assert_eq!(profile.loyalty_points, 0);
    }
}
