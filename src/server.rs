//! The caption service: one POST route that stages, validates, captions and
//! cleans up. Per request the states are Received → Staged → Validated →
//! Captioned, and the staging guard releases the temp file on every exit.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::captioner::Captioner;
use crate::config::ServiceConfig;
use crate::error::CaptionError;
use crate::staging::StagedImage;

/// Generous enough for phone photos; the page advertises 10 MB.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct CaptionResponse {
    pub caption: String,
}

pub(crate) struct ImageUpload {
    pub(crate) filename: Option<String>,
    pub(crate) bytes: Bytes,
}

/// Builds the service router around a process-wide captioner handle.
pub fn router<C: Captioner>(captioner: Arc<C>) -> Router {
    Router::new()
        .route("/generate_caption", post(generate_caption::<C>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(captioner)
}

pub async fn serve<C: Captioner>(config: &ServiceConfig, captioner: Arc<C>) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, model = %config.model, "caption service listening");
    axum::serve(listener, router(captioner))
        .await
        .context("caption service exited")?;
    Ok(())
}

async fn generate_caption<C: Captioner>(
    State(captioner): State<Arc<C>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CaptionResponse>, CaptionError> {
    match caption_upload(captioner.as_ref(), multipart).await {
        Ok(caption) => {
            info!(chars = caption.chars().count(), "caption generated");
            Ok(Json(CaptionResponse { caption }))
        }
        Err(err) => {
            log_failure(&err);
            Err(err)
        }
    }
}

async fn caption_upload<C: Captioner>(
    captioner: &C,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, CaptionError> {
    let upload = image_field(multipart).await?;
    let staged = StagedImage::stage(&upload.bytes, upload.filename.as_deref())?;
    validate_image(staged.path())?;
    info!(
        filename = upload.filename.as_deref().unwrap_or("<unnamed>"),
        "image validated"
    );
    captioner.caption(staged.path()).await
}

/// Pulls the `image` field out of the form. A request that is not multipart
/// at all, or whose body is not readable as multipart, counts as missing
/// too: no file was successfully presented. The extractor's own rejection is
/// swallowed here so the wire format stays `{"error": …}` JSON.
pub(crate) async fn image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ImageUpload, CaptionError> {
    let mut multipart = multipart.map_err(|_| CaptionError::MissingUpload)?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| CaptionError::MissingUpload)?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|err| {
            // running past the body limit is the caller's doing, not an
            // internal fault
            if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                CaptionError::UploadTooLarge
            } else {
                CaptionError::ImagePipeline(err.into())
            }
        })?;
        return Ok(ImageUpload { filename, bytes });
    }
    Err(CaptionError::MissingUpload)
}

/// Pure decode gate: the staged file must decode as an image and normalize
/// to 3-channel color. The pixels are discarded afterwards; the model reads
/// the staged file itself. Content is sniffed, the extension is not trusted.
fn validate_image(path: &Path) -> Result<(), CaptionError> {
    let reader = image::io::Reader::open(path)
        .map_err(|err| CaptionError::ImagePipeline(err.into()))?
        .with_guessed_format()
        .map_err(|err| CaptionError::ImagePipeline(err.into()))?;
    let decoded = reader.decode().map_err(CaptionError::from_decode)?;
    decoded.to_rgb8();
    Ok(())
}

fn log_failure(err: &CaptionError) {
    match err {
        CaptionError::MissingUpload => warn!("request carried no image field"),
        CaptionError::UploadTooLarge => warn!("upload exceeded the body limit"),
        CaptionError::InvalidImage(source) => {
            warn!(%source, "uploaded file is not a valid image");
        }
        CaptionError::ImagePipeline(source) => {
            error!(source = format!("{source:#}"), "error processing image");
        }
        CaptionError::Inference(source) => {
            error!(source = format!("{source:#}"), "failed to generate caption");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageOutputFormat, Rgb};

    #[test]
    fn validate_accepts_a_png_and_rejects_text() {
        let img = ImageBuffer::from_pixel(4, 4, Rgb([10u8, 20, 30]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();

        let good = StagedImage::stage(&png, Some("tiny.png")).unwrap();
        assert!(validate_image(good.path()).is_ok());

        // a text file renamed to .jpg must fail as invalid, not as I/O
        let bad = StagedImage::stage(b"plain text, no pixels", Some("fake.jpg")).unwrap();
        assert!(matches!(
            validate_image(bad.path()),
            Err(CaptionError::InvalidImage(_))
        ));
    }
}
