use crate::config::AppConfig;
use crate::services::vault::Vault;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<Vault>> {
    tokio::fs::create_dir_all(&config.storage_root).await?;

    info!("🗄️  Storage root: {}", config.storage_root.display());

    Ok(Arc::new(Vault::new(config.storage_root.clone())))
}
