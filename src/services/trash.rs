use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::vault::Vault;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

pub struct TrashService;

impl TrashService {
    /// Fetch a record if and only if the caller owns it. A record held by
    /// another owner is Forbidden; the response carries no record detail.
    pub async fn find_owned(
        db: &DatabaseConnection,
        owner_id: &str,
        file_id: &str,
    ) -> Result<Option<stored_files::Model>, AppError> {
        match StoredFiles::find_by_id(file_id).one(db).await? {
            None => Ok(None),
            Some(record) if record.owner_id != owner_id => {
                Err(AppError::Forbidden("Not your file".to_string()))
            }
            Some(record) => Ok(Some(record)),
        }
    }

    /// List an owner's files, newest first
    pub async fn list(
        db: &DatabaseConnection,
        owner_id: &str,
        trashed: bool,
    ) -> Result<Vec<stored_files::Model>, AppError> {
        let records = StoredFiles::find()
            .filter(stored_files::Column::OwnerId.eq(owner_id))
            .filter(stored_files::Column::Trashed.eq(trashed))
            .order_by_desc(stored_files::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records)
    }

    /// Soft-delete. Already-trashed records are a no-op success.
    pub async fn trash(
        db: &DatabaseConnection,
        owner_id: &str,
        file_id: &str,
    ) -> Result<(), AppError> {
        let record = Self::find_owned(db, owner_id, file_id)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        if record.trashed {
            return Ok(());
        }
        let mut active: stored_files::ActiveModel = record.into();
        active.trashed = Set(true);
        active.update(db).await?;
        Ok(())
    }

    /// Undo a soft-delete. Already-active records are a no-op success.
    pub async fn restore(
        db: &DatabaseConnection,
        owner_id: &str,
        file_id: &str,
    ) -> Result<(), AppError> {
        let record = Self::find_owned(db, owner_id, file_id)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        if !record.trashed {
            return Ok(());
        }
        let mut active: stored_files::ActiveModel = record.into();
        active.trashed = Set(false);
        active.update(db).await?;
        Ok(())
    }

    /// Permanent deletion, allowed from any state. Bytes go first: a crash
    /// between the two phases leaves a catalog row with no backing file,
    /// which is detectable on next access, rather than an untracked file on
    /// disk, which is not. Both phases tolerate repetition, so retrying a
    /// half-finished purge converges.
    pub async fn purge(
        db: &DatabaseConnection,
        vault: &Vault,
        owner_id: &str,
        file_id: &str,
    ) -> Result<(), AppError> {
        let Some(record) = Self::find_owned(db, owner_id, file_id).await? else {
            // Already gone
            return Ok(());
        };

        vault.remove(&record.owner_id, &record.stored_name).await?;

        let active: stored_files::ActiveModel = record.into();
        active.delete(db).await?;
        Ok(())
    }
}
