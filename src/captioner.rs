//! The captioning capability: image file in, short description out.
//!
//! The model itself is opaque. The service addresses a pretrained
//! vision-to-text model by name over the Hugging Face inference API and
//! treats the call as a black box that either yields a caption or fails.

use std::future::Future;
use std::path::Path;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::CaptionError;

/// Captions never exceed this many characters; free-form decoders
/// occasionally ramble.
pub const MAX_CAPTION_CHARS: usize = 512;

/// A vision-to-text model the service can hand a staged image to.
///
/// Implementations connect or load once at startup and are shared read-only
/// across requests.
pub trait Captioner: Send + Sync + 'static {
    /// Produce a short natural-language description of the image at `image`.
    fn caption(&self, image: &Path) -> impl Future<Output = Result<String, CaptionError>> + Send;
}

/// One row of the hosted inference API's response.
#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Captioner backed by a hosted pretrained model, addressed by name.
///
/// Holds one `reqwest::Client`; cheap to share behind an `Arc` for the
/// process lifetime.
pub struct RemoteCaptioner {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl RemoteCaptioner {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "https://api-inference.huggingface.co/models/{}",
                config.model
            ),
            api_token: config.api_token.clone(),
        }
    }
}

impl Captioner for RemoteCaptioner {
    async fn caption(&self, image: &Path) -> Result<String, CaptionError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|err| CaptionError::Inference(err.into()))?;
        debug!(size = bytes.len(), endpoint = %self.endpoint, "requesting caption");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .body(bytes)
            .send()
            .await
            .map_err(|err| CaptionError::Inference(err.into()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| CaptionError::Inference(err.into()))?;
        if !status.is_success() {
            return Err(CaptionError::Inference(anyhow!(
                "model endpoint returned {status}: {body}"
            )));
        }

        parse_caption(&body)
    }
}

fn parse_caption(body: &str) -> Result<String, CaptionError> {
    let rows: Vec<GeneratedText> =
        serde_json::from_str(body).map_err(|err| CaptionError::Inference(err.into()))?;
    rows.into_iter()
        .map(|row| bound_caption(row.generated_text))
        .find(|caption| !caption.is_empty())
        .ok_or_else(|| CaptionError::Inference(anyhow!("model returned no caption")))
}

fn bound_caption(raw: String) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(MAX_CAPTION_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}
