//! MongoDB tokenizer store.

use super::record::{HmacRef, TokenizerRecord, TokenizerState, now_millis};
use super::TokenizerStore;
use crate::config::StoreSettings;
use crate::error::TokenizerError;
use async_trait::async_trait;
use bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info, instrument};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Schemas that declare their own indexes.
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

impl IntoIndexes for TokenizerRecord {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "tokenizer.id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("tokenizer_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tokenizer.state": 1 },
                Some(
                    IndexOptions::builder()
                        .name("tokenizer_state".to_string())
                        .build(),
                ),
            ),
            // At most one document may carry the `current` field.
            (
                doc! { "tokenizer.current": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "tokenizer.current": { "$exists": true } })
                        .name("tokenizer_current_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

/// Tokenizer store on a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoTokenizerStore {
    collection: Collection<TokenizerRecord>,
}

impl MongoTokenizerStore {
    /// Wrap an existing collection.
    #[must_use]
    pub const fn new(collection: Collection<TokenizerRecord>) -> Self {
        Self { collection }
    }

    /// Connect and verify the deployment is reachable.
    ///
    /// # Errors
    ///
    /// Returns a database error if the connection or ping fails.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, TokenizerError> {
        info!(database = %settings.database, collection = %settings.collection, "Connecting to MongoDB");

        let client = Client::with_uri_str(&settings.uri)
            .await
            .map_err(|e| TokenizerError::database(format!("Failed to connect to MongoDB: {e}")))?;
        let database = client.database(&settings.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| TokenizerError::database(format!("MongoDB ping failed: {e}")))?;

        Ok(Self::new(database.collection(&settings.collection)))
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    is_duplicate_kind(&err.kind)
}

fn is_duplicate_kind(kind: &ErrorKind) -> bool {
    match kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

#[async_trait]
impl TokenizerStore for MongoTokenizerStore {
    #[instrument(skip(self))]
    async fn ensure_indexes(&self) -> Result<(), TokenizerError> {
        let indexes: Vec<IndexModel> = TokenizerRecord::into_indices()
            .into_iter()
            .map(|(keys, options)| IndexModel::builder().keys(keys).options(options).build())
            .collect();

        self.collection
            .create_indexes(indexes)
            .await
            .map_err(|e| TokenizerError::database(format!("Failed to create indexes: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(tokenizer_id = %record.tokenizer.id))]
    async fn insert(&self, record: &TokenizerRecord) -> Result<(), TokenizerError> {
        match self.collection.insert_one(record).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(TokenizerError::duplicate(record.tokenizer.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<TokenizerRecord>, TokenizerError> {
        Ok(self.collection.find_one(doc! { "tokenizer.id": id }).await?)
    }

    #[instrument(skip(self))]
    async fn find_current(&self) -> Result<Option<TokenizerRecord>, TokenizerError> {
        Ok(self
            .collection
            .find_one(doc! { "tokenizer.current": true })
            .await?)
    }

    #[instrument(skip(self, hmac))]
    async fn add_keystore_and_hmac(
        &self,
        id: &str,
        keystore: &str,
        hmac: &HmacRef,
    ) -> Result<(), TokenizerError> {
        let filter = doc! {
            "tokenizer.id": id,
            "tokenizer.state": TokenizerState::Pending.as_str(),
        };
        let update = doc! {
            "$set": {
                "meta.updated": now_millis(),
                "tokenizer.state": TokenizerState::Ready.as_str(),
                "tokenizer.keystore": keystore,
                "tokenizer.hmac": { "id": hmac.id.as_str(), "type": hmac.key_type.as_str() },
            }
        };

        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(TokenizerError::invalid_state(format!(
                "Tokenizer {id} is no longer pending"
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_ready_as_current(&self) -> Result<bool, TokenizerError> {
        let filter = doc! { "tokenizer.state": TokenizerState::Ready.as_str() };
        let update = doc! {
            "$set": {
                "meta.updated": now_millis(),
                "tokenizer.state": TokenizerState::Current.as_str(),
                "tokenizer.current": true,
            }
        };

        match self.collection.update_one(filter, update).await {
            Ok(result) => Ok(result.modified_count != 0),
            Err(e) if is_duplicate_key(&e) => {
                debug!("Current slot already taken");
                Err(TokenizerError::duplicate("current tokenizer"))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn deprecate_current(&self) -> Result<bool, TokenizerError> {
        let filter = doc! { "tokenizer.state": TokenizerState::Current.as_str() };
        let update = doc! {
            "$set": {
                "meta.updated": now_millis(),
                "tokenizer.state": TokenizerState::Deprecated.as_str(),
            },
            "$unset": { "tokenizer.current": "" }
        };

        let result = self.collection.update_one(filter, update).await?;
        Ok(result.modified_count != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::error::WriteError;

    #[test]
    fn test_index_definitions() {
        let indexes = TokenizerRecord::into_indices();
        assert_eq!(indexes.len(), 3);

        let (keys, options) = &indexes[2];
        assert_eq!(keys, &doc! { "tokenizer.current": 1 });
        let options = options.as_ref().unwrap();
        assert_eq!(options.unique, Some(true));
        assert_eq!(
            options.partial_filter_expression,
            Some(doc! { "tokenizer.current": { "$exists": true } })
        );

        let (_, id_options) = &indexes[0];
        assert_eq!(id_options.as_ref().unwrap().unique, Some(true));
    }

    fn write_error(code: i32) -> ErrorKind {
        let error: WriteError = bson::from_document(doc! {
            "code": code,
            "errmsg": "E11000 duplicate key error collection: tokenizer.tokenizer-tokenizer",
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteError(error))
    }

    #[test]
    fn test_duplicate_key_write_error_detected() {
        assert!(is_duplicate_kind(&write_error(DUPLICATE_KEY_CODE)));
    }

    #[test]
    fn test_other_write_errors_not_duplicates() {
        // DocumentValidationFailure
        assert!(!is_duplicate_kind(&write_error(121)));
    }

    #[test]
    fn test_record_bson_shape() {
        let record = TokenizerRecord::pending("did:key:z1", "primary", Some(b"s"));
        let document = bson::to_document(&record).unwrap();
        let tokenizer = document.get_document("tokenizer").unwrap();

        assert_eq!(tokenizer.get_str("state").unwrap(), "pending");
        assert!(!tokenizer.contains_key("current"));
        assert!(document.get_document("meta").unwrap().get_i64("created").is_ok());
    }
}
