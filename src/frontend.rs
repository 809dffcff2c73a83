use std::sync::Arc;

use image_captioner::config::UiConfig;
use image_captioner::ui::{self, UiState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = UiConfig::from_env()?;
    let state = Arc::new(UiState::new(&config));
    ui::serve(&config, state).await
}
