use crate::api::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};

/// Number of exclusive-create attempts before giving up on a stored name
const ALLOCATE_ATTEMPTS: usize = 8;

/// The on-disk storage tree: one subdirectory per owner, containing only
/// files named by [`Vault::allocate`]. Owners never share a namespace.
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reduce an untrusted display name to a filesystem-safe one: keep only
    /// the final path component and replace everything outside
    /// `[A-Za-z0-9._-]` with `_`. Names that normalize to nothing but dots
    /// and underscores are rejected.
    pub fn sanitize_name(name: &str) -> Result<String, AppError> {
        let last = name.rsplit(['/', '\\']).next().unwrap_or("");
        let cleaned: String = last
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if cleaned.chars().all(|c| matches!(c, '.' | '_')) {
            return Err(AppError::BadRequest(
                "Filename is empty after sanitization".to_string(),
            ));
        }
        Ok(cleaned)
    }

    pub fn path_for(&self, owner_id: &str, stored_name: &str) -> PathBuf {
        self.root.join(owner_id).join(stored_name)
    }

    /// Create the owner's directory if it does not exist yet. Idempotent and
    /// safe under concurrent first use by the same owner.
    pub async fn ensure_namespace(&self, owner_id: &str) -> Result<PathBuf, AppError> {
        let dir = self.root.join(owner_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!("Failed to create namespace {}: {}", dir.display(), e);
            AppError::Storage("Owner namespace is not writable".to_string())
        })?;
        Ok(dir)
    }

    /// Reserve a unique stored name for `original_name` and open it for
    /// writing. The name is prefixed with the current millisecond timestamp;
    /// the exclusive create makes two racing uploads of the same name in the
    /// same instant land on distinct files, the loser retrying with a random
    /// suffix.
    pub async fn allocate(
        &self,
        owner_id: &str,
        original_name: &str,
    ) -> Result<(String, File), AppError> {
        let safe = Self::sanitize_name(original_name)?;
        let dir = self.ensure_namespace(owner_id).await?;

        let mut candidate = format!("{}_{}", chrono::Utc::now().timestamp_millis(), safe);
        for _ in 0..ALLOCATE_ATTEMPTS {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&candidate))
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let salt: u32 = rand::random();
                    candidate = format!(
                        "{}_{:08x}_{}",
                        chrono::Utc::now().timestamp_millis(),
                        salt,
                        safe
                    );
                }
                Err(e) => {
                    tracing::error!("Failed to create {} in {}: {}", candidate, dir.display(), e);
                    return Err(AppError::Storage(
                        "Could not create file in owner namespace".to_string(),
                    ));
                }
            }
        }

        Err(AppError::Storage(
            "Could not reserve a unique stored name".to_string(),
        ))
    }

    /// Open stored bytes for reading. A missing file for a name the catalog
    /// still references is a consistency fault, not a plain not-found.
    pub async fn open(&self, owner_id: &str, stored_name: &str) -> Result<File, AppError> {
        let path = self.path_for(owner_id, stored_name);
        match File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::Consistency(format!(
                "Backing file missing for stored name {stored_name}"
            ))),
            Err(e) => {
                tracing::error!("Failed to open {}: {}", path.display(), e);
                Err(AppError::Storage("Could not read stored file".to_string()))
            }
        }
    }

    /// Remove stored bytes. Already-absent files count as success so that
    /// purge retries stay idempotent.
    pub async fn remove(&self, owner_id: &str, stored_name: &str) -> Result<(), AppError> {
        let path = self.path_for(owner_id, stored_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!("Failed to remove {}: {}", path.display(), e);
                Err(AppError::Storage("Could not remove stored file".to_string()))
            }
        }
    }
}
