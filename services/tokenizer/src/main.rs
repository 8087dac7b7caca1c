use anyhow::Context;
use std::sync::Arc;
use tokenizer_service::config::Config;
use tokenizer_service::kms::KeystoreProvisioner;
use tokenizer_service::storage::{MongoTokenizerStore, TokenizerStore};
use tokenizer_service::LifecycleCoordinator;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webkms_client::{WebKmsClient, WebKmsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Tokenizer Service");

    let config = Config::from_env().context("Failed to load configuration")?;

    let kms_config = WebKmsConfig::new(config.kms.base_url.clone()).with_timeout(config.kms.timeout);
    let kms = Arc::new(WebKmsClient::new(kms_config).context("Failed to build KMS client")?);

    let store = MongoTokenizerStore::connect(&config.store).await?;
    store.ensure_indexes().await?;

    let provisioner = KeystoreProvisioner::new(kms, config.kms.clone());
    let coordinator = LifecycleCoordinator::new(Arc::new(store), provisioner, &config.lifecycle)?;

    if std::env::args().nth(1).as_deref() == Some("rotate") {
        let deprecated = coordinator.deprecate_current().await?;
        info!(deprecated, "Rotation requested");
    }

    let tokenizer = coordinator.get_current().await?;
    info!(tokenizer_id = %tokenizer.id(), "Current tokenizer resolved");

    Ok(())
}
