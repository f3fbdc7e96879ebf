//! Address document schema
//!
//! Addresses are shared by reference: profiles, business applications and
//! manager applications all point at rows in this collection. Rows are
//! immutable once written - an address change inserts a new row and
//! re-points the referrer, so other referrers never observe the edit.

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for addresses
pub const ADDRESS_COLLECTION: &str = "addresses";

/// Postal address payload supplied by registration and profile updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub area: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Address document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AddressDoc {
    /// MongoDB ObjectId (auto-generated)
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    pub street: String,
    pub area: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl AddressDoc {
    pub fn new(input: AddressInput) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            street: input.street,
            area: input.area,
            city: input.city,
            postal_code: input.postal_code,
            country: input.country,
        }
    }
}

impl IntoIndexes for AddressDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for AddressDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
