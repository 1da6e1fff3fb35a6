use crate::api::error::AppError;
use crate::entities::stored_files;
use crate::services::account::is_unique_violation;
use crate::services::share::ShareService;
use crate::services::vault::Vault;
use bytes::Bytes;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Share-token collisions are astronomically unlikely at 24 random bytes,
/// but the insert still retries instead of assuming.
const SHARE_TOKEN_ATTEMPTS: usize = 5;

/// One incoming upload, already buffered by the transport layer
pub struct IncomingFile {
    pub original_name: String,
    pub bytes: Bytes,
}

/// Result for a single file in a batch. Failures never abort the rest of
/// the batch.
pub struct IngestOutcome {
    pub original_name: String,
    pub result: Result<stored_files::Model, AppError>,
}

pub struct IngestService {
    db: DatabaseConnection,
    vault: Arc<Vault>,
}

impl IngestService {
    pub fn new(db: DatabaseConnection, vault: Arc<Vault>) -> Self {
        Self { db, vault }
    }

    /// Ingest a batch of files for one owner. The optional share password
    /// applies to every file in the batch.
    pub async fn ingest(
        &self,
        owner_id: &str,
        files: Vec<IncomingFile>,
        share_password: Option<&str>,
    ) -> Result<Vec<IngestOutcome>, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files in upload".to_string()));
        }

        let share_password_hash = match share_password {
            Some(p) if !p.is_empty() => Some(ShareService::hash_password(p)?),
            _ => None,
        };

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let original_name = file.original_name.clone();
            let result = self
                .ingest_one(owner_id, file, share_password_hash.clone())
                .await;

            if let Err(ref e) = result {
                tracing::warn!("Upload of '{}' failed: {}", original_name, e);
            }
            outcomes.push(IngestOutcome {
                original_name,
                result,
            });
        }

        Ok(outcomes)
    }

    /// Bytes land on disk before the catalog row exists. If the row cannot
    /// be inserted, the freshly written bytes are removed again so the
    /// namespace never accumulates untracked files.
    async fn ingest_one(
        &self,
        owner_id: &str,
        file: IncomingFile,
        share_password_hash: Option<String>,
    ) -> Result<stored_files::Model, AppError> {
        let (stored_name, handle) = self.vault.allocate(owner_id, &file.original_name).await?;
        let size_bytes = file.bytes.len() as i64;

        if let Err(e) = write_durably(handle, &file.bytes).await {
            tracing::error!("Failed to write '{}': {}", stored_name, e);
            let _ = self.vault.remove(owner_id, &stored_name).await;
            return Err(AppError::Storage("Failed to persist upload".to_string()));
        }

        match self
            .insert_record(
                owner_id,
                &stored_name,
                &file.original_name,
                size_bytes,
                share_password_hash,
            )
            .await
        {
            Ok(model) => Ok(model),
            Err(e) => {
                let _ = self.vault.remove(owner_id, &stored_name).await;
                Err(e)
            }
        }
    }

    async fn insert_record(
        &self,
        owner_id: &str,
        stored_name: &str,
        original_name: &str,
        size_bytes: i64,
        share_password_hash: Option<String>,
    ) -> Result<stored_files::Model, AppError> {
        for attempt in 1..=SHARE_TOKEN_ATTEMPTS {
            let record = stored_files::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                owner_id: Set(owner_id.to_string()),
                stored_name: Set(stored_name.to_string()),
                original_name: Set(original_name.to_string()),
                size_bytes: Set(size_bytes),
                created_at: Set(Utc::now()),
                share_id: Set(ShareService::generate_token()),
                share_password_hash: Set(share_password_hash.clone()),
                trashed: Set(false),
            };

            match record.insert(&self.db).await {
                Ok(model) => return Ok(model),
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!(
                        "Share token collision on attempt {}, regenerating",
                        attempt
                    );
                }
                Err(e) => return Err(AppError::Database(e)),
            }
        }

        Err(AppError::Internal(
            "Could not assign a unique share token".to_string(),
        ))
    }
}

async fn write_durably(mut handle: File, bytes: &[u8]) -> std::io::Result<()> {
    handle.write_all(bytes).await?;
    handle.flush().await?;
    handle.sync_all().await
}
