use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::vault::Vault;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::fs::File;

/// Everything the boundary needs to stream a shared file back. Carries no
/// owner identity and no storage path.
pub struct ResolvedShare {
    pub original_name: String,
    pub size_bytes: i64,
    pub file: File,
}

pub struct ShareService;

impl ShareService {
    /// Generate a URL-safe random token for share links
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..24).map(|_| rng.r#gen()).collect();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Hash a share password using argon2
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Verify a share password against the stored hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let argon2 = Argon2::default();
        let parsed_hash =
            argon2::PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Resolve a share token for anonymous retrieval. Trashed files are
    /// hidden here: trashing removes a file from its public link until the
    /// owner restores it.
    pub async fn resolve_public(
        db: &DatabaseConnection,
        vault: &Vault,
        share_id: &str,
        supplied_password: Option<&str>,
    ) -> Result<ResolvedShare, AppError> {
        let record = StoredFiles::find()
            .filter(stored_files::Column::ShareId.eq(share_id))
            .filter(stored_files::Column::Trashed.eq(false))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        if let Some(hash) = &record.share_password_hash {
            let supplied = supplied_password.unwrap_or("");
            if !Self::verify_password(supplied, hash)? {
                return Err(AppError::Unauthorized(
                    "Invalid share password".to_string(),
                ));
            }
        }

        let file = vault.open(&record.owner_id, &record.stored_name).await?;

        Ok(ResolvedShare {
            original_name: record.original_name,
            size_bytes: record.size_bytes,
            file,
        })
    }
}
