//! Process configuration, read once at startup from the environment.
//!
//! Both binaries call `dotenvy::dotenv()` before constructing their config,
//! so a local `.env` works the same as exported variables.

use std::env;

use anyhow::{Context, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UI_PORT: u16 = 8501;
pub const DEFAULT_MODEL: &str = "nlpconnect/vit-gpt2-image-captioning";
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";

/// Settings for the caption service (`captiond`).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Name of the pretrained captioning model to address.
    pub model: String,
    /// Bearer token for the hosted model endpoint.
    pub api_token: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("CAPTIOND_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: port_from_env("CAPTIOND_PORT", DEFAULT_PORT)?,
            model: env::var("CAPTION_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_token: env::var("HF_API_TOKEN")
                .context("HF_API_TOKEN must be set (in the environment or a .env file)")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the browser front end (`caption-ui`).
#[derive(Debug, Clone)]
pub struct UiConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the caption service this front end talks to.
    pub service_url: String,
}

impl UiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("CAPTION_UI_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: port_from_env("CAPTION_UI_PORT", DEFAULT_UI_PORT)?,
            service_url: env::var("CAPTION_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_SERVICE_URL.to_string()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn port_from_env(key: &str, default: u16) -> Result<u16> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a port number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
