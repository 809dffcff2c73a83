//! The request-error taxonomy and its mapping onto the wire format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Everything that can go wrong while captioning one upload.
///
/// Each kind carries its HTTP status and exact user-facing message; error
/// sources are kept for logging and never serialized into a response.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// The multipart form carried no `image` field.
    #[error("No file uploaded")]
    MissingUpload,

    /// The uploaded bytes did not decode as a supported image format.
    #[error("Uploaded file is not a valid image")]
    InvalidImage(#[source] image::ImageError),

    /// The upload ran past the service's body limit.
    #[error("Uploaded file is too large")]
    UploadTooLarge,

    /// A non-decode fault in the image pipeline: staging I/O, reading the
    /// upload body.
    #[error("Error processing image")]
    ImagePipeline(#[source] anyhow::Error),

    /// The captioning model failed to produce a caption.
    #[error("Failed to generate caption")]
    Inference(#[source] anyhow::Error),
}

impl CaptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CaptionError::MissingUpload | CaptionError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            CaptionError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            CaptionError::ImagePipeline(_) | CaptionError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Split a decode-time fault into "not an image" and everything else.
    /// An unrecognized or corrupt payload is the caller's problem; an I/O or
    /// limit fault while decoding is ours.
    pub fn from_decode(err: image::ImageError) -> Self {
        if matches!(
            err,
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_)
        ) {
            CaptionError::InvalidImage(err)
        } else {
            CaptionError::ImagePipeline(err.into())
        }
    }
}

impl IntoResponse for CaptionError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
