//! MongoDB implementation of HistoryStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    Client, Collection,
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::HistoryStore;
use crate::error::AppResult;
use crate::models::{HistoryRecord, UserId};

/// Creates a MongoDB client
///
/// The driver connects lazily, so this only validates the connection string.
pub async fn create_mongo_client(mongo_uri: &str) -> anyhow::Result<Client> {
    let client = Client::with_uri_str(mongo_uri).await?;
    Ok(client)
}

/// Raw document as written by the transcript generator
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryDocument {
    #[serde(default)]
    user_id: Bson,
    #[serde(default)]
    project_id: Bson,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    interviewing_time: Option<i64>,
    #[serde(default)]
    created_at: Option<mongodb::bson::DateTime>,
}

/// Renders ObjectId and string identifiers the same way
fn id_to_string(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<HistoryDocument> for HistoryRecord {
    fn from(doc: HistoryDocument) -> Self {
        Self {
            user_id: id_to_string(&doc.user_id),
            project_id: id_to_string(&doc.project_id),
            transcript: doc.transcript.unwrap_or_default(),
            interviewing_time: doc.interviewing_time,
            created_at: doc
                .created_at
                .and_then(|dt| DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())),
        }
    }
}

/// Interview history backed by a MongoDB collection
pub struct MongoHistoryStore {
    collection: Collection<HistoryDocument>,
}

impl MongoHistoryStore {
    pub fn new(client: &Client, db_name: &str, collection_name: &str) -> Self {
        let collection = client
            .database(db_name)
            .collection::<HistoryDocument>(collection_name);
        Self { collection }
    }

    /// Filter matching exactly one representation of the identifier
    fn build_filter(user_id: &UserId) -> Document {
        match user_id {
            UserId::ObjectId(oid) => doc! { "userId": *oid },
            UserId::Raw(id) => doc! { "userId": id.as_str() },
        }
    }
}

#[async_trait]
impl HistoryStore for MongoHistoryStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch(&self, user_id: &UserId) -> AppResult<Vec<HistoryRecord>> {
        let cursor = self.collection.find(Self::build_filter(user_id)).await?;
        let docs: Vec<HistoryDocument> = cursor.try_collect().await?;

        tracing::debug!(records = docs.len(), "Fetched interview history");

        Ok(docs.into_iter().map(HistoryRecord::from).collect())
    }
}
