use std::sync::Arc;

use image_captioner::captioner::RemoteCaptioner;
use image_captioner::config::ServiceConfig;
use image_captioner::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env()?;
    // the model handle is built once and shared read-only for the process
    // lifetime
    let captioner = Arc::new(RemoteCaptioner::new(&config));
    server::serve(&config, captioner).await
}
