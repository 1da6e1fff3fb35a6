use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

pub struct AccountService;

impl AccountService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        let argon2 = Argon2::default();
        let parsed_hash =
            argon2::PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Create an account. The email is unique across the catalog.
    pub async fn register(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
    ) -> Result<users::Model, AppError> {
        if email.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }

        let account = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            email: Set(email.to_string()),
            password_hash: Set(Self::hash_password(password)?),
            created_at: Set(Some(Utc::now())),
        };

        match account.insert(db).await {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Verify credentials. Unknown email and wrong password collapse into the
    /// same answer.
    pub async fn verify(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
    ) -> Result<users::Model, AppError> {
        let account = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await?
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !Self::verify_password(password, &account.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        Ok(account)
    }
}

/// SQLite reports 2067, Postgres 23505
pub(crate) fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("2067") || msg.contains("23505") || msg.to_lowercase().contains("unique")
}
