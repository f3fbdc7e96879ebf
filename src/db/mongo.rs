//! MongoDB connection handling and typed collection access

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::RegistrarError;

/// Index definitions a schema asks to have applied when its collection opens
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Mutable access to a document's timestamp metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Shared MongoDB client bound to one database
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect to MongoDB and verify the database is reachable
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, RegistrarError> {
        info!("Opening MongoDB connection to {}", uri);

        // Bound server selection so an unreachable host fails fast instead of hanging
        let bounded_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&bounded_uri)
            .await
            .map_err(|e| RegistrarError::Store(format!("Failed to connect to MongoDB: {}", e)))?;

        // Ping before handing the client out
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RegistrarError::Store(format!("MongoDB ping failed: {}", e)))?;

        info!("MongoDB database '{}' ready", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection, applying its declared indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, RegistrarError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }
}

/// Typed collection handle; indexes are ensured at construction
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, RegistrarError> {
        let handle = MongoCollection {
            inner: client.database(db_name).collection::<T>(collection_name),
        };

        handle.ensure_indexes().await?;

        Ok(handle)
    }

    async fn ensure_indexes(&self) -> Result<(), RegistrarError> {
        let declared = T::into_indices();

        if declared.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = declared
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(models)
            .await
            .map_err(|e| RegistrarError::Store(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping created/updated timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, RegistrarError> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let inserted = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| RegistrarError::Store(format!("Insert failed: {}", e)))?;

        inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| RegistrarError::Store("inserted document came back without an id".into()))
    }

    /// Find a single document matching the filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, RegistrarError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| RegistrarError::Store(format!("Find failed: {}", e)))
    }

    /// Collect all documents matching the filter
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, RegistrarError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(filter)
            .await
            .map_err(|e| RegistrarError::Store(format!("Find failed: {}", e)))?;

        let rows: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Skipping unreadable document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(rows)
    }

    /// Apply an update to the first document matching the filter
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, RegistrarError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| RegistrarError::Store(format!("Update failed: {}", e)))
    }

    /// Atomically update one document and return the updated state.
    ///
    /// Returns `None` when no document matched the filter. With a filter
    /// that pins the expected current state this is a compare-and-swap:
    /// exactly one concurrent caller observes `Some`.
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<Option<T>, RegistrarError> {
        self.inner
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| RegistrarError::Store(format!("Conditional update failed: {}", e)))
    }

    /// Hard-delete one document. Used only to compensate partial writes
    /// of a failed multi-row step.
    pub async fn delete_one(&self, filter: Document) -> Result<u64, RegistrarError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| RegistrarError::Store(format!("Delete failed: {}", e)))?;

        Ok(result.deleted_count)
    }
}
