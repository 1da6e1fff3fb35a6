use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the on-disk storage tree (one subdirectory per owner)
    pub storage_root: PathBuf,

    /// Maximum accepted upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Allowed CORS origins (comma separated in the environment)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./uploads"),
            max_file_size: 256 * 1024 * 1024,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.storage_root),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            // Fallback for dev convenience only
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }
}
