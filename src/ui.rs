//! The browser front end: serves the upload page and forwards the selected
//! image to the caption service.
//!
//! The page keeps its transient copy of the image in memory (a `FileReader`
//! data URL for the preview plus the `File` handle); picking a new image
//! supersedes the old one and clears any stale caption or error. The proxy
//! route exists so the page never needs to know where the service lives and
//! so transport faults become displayable errors instead of CORS noise.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::UiConfig;
use crate::server;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct UiState {
    client: reqwest::Client,
    caption_url: String,
}

impl UiState {
    pub fn new(config: &UiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            caption_url: format!(
                "{}/generate_caption",
                config.service_url.trim_end_matches('/')
            ),
        }
    }
}

pub fn router(state: Arc<UiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/caption", post(forward_caption))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &UiConfig, state: Arc<UiState>) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, service = %state.caption_url, "caption ui listening");
    axum::serve(listener, router(state))
        .await
        .context("caption ui exited")?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Relays the uploaded image to the caption service and the service's JSON
/// verdict back to the page. Every transport fault maps to one displayable
/// error; nothing is retried.
async fn forward_caption(
    State(state): State<Arc<UiState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let upload = match server::image_field(multipart).await {
        Ok(upload) => upload,
        // no point bothering the service without a file
        Err(err) => return err.into_response(),
    };

    let filename = upload
        .filename
        .unwrap_or_else(|| "upload.bin".to_string());
    let part = reqwest::multipart::Part::bytes(upload.bytes.to_vec()).file_name(filename);
    let form = reqwest::multipart::Form::new().part("image", part);

    let response = match state.client.post(&state.caption_url).multipart(form).send().await {
        Ok(response) => response,
        Err(err) => {
            error!(%err, "caption service unreachable");
            return displayable_error(StatusCode::BAD_GATEWAY, "Could not reach the caption service");
        }
    };

    // reqwest and axum sit on different http versions; carry the status over
    // by value
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    match response.json::<Value>().await {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => {
            error!(%err, "caption service returned a non-JSON body");
            displayable_error(
                StatusCode::BAD_GATEWAY,
                "Caption service returned an unreadable response",
            )
        }
    }
}

fn displayable_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Image Caption Generator</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #eef1f8;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .panel {
            background: white;
            border-radius: 12px;
            box-shadow: 0 10px 30px rgba(45, 74, 138, 0.15);
            max-width: 680px;
            width: 100%;
            padding: 32px;
        }

        h1 { color: #2d4a8a; font-size: 1.6em; margin-bottom: 6px; }
        .subtitle { color: #5a5a5a; margin-bottom: 24px; }

        .drop-zone {
            border: 2px dashed #2d4a8a;
            border-radius: 10px;
            padding: 40px 16px;
            text-align: center;
            cursor: pointer;
            color: #2d4a8a;
            background: #f7f9ff;
        }
        .drop-zone.dragover { background: #e6ecfb; }
        .drop-zone .hint { color: #888; font-size: 0.85em; margin-top: 8px; }
        input[type="file"] { display: none; }

        .preview { margin-top: 20px; display: none; }
        .preview img {
            max-width: 100%;
            border-radius: 8px;
            box-shadow: 0 3px 10px rgba(0, 0, 0, 0.12);
        }

        button {
            margin-top: 16px;
            background: #2d4a8a;
            color: white;
            border: none;
            border-radius: 6px;
            padding: 10px 22px;
            font-size: 1em;
            font-weight: 600;
            cursor: pointer;
        }
        button:disabled { background: #a9b6d6; cursor: default; }
        button:hover:enabled { background: #1b3375; }

        .spinner {
            display: none;
            margin: 20px auto 0;
            width: 36px;
            height: 36px;
            border: 4px solid #e6ecfb;
            border-top-color: #2d4a8a;
            border-radius: 50%;
            animation: spin 0.9s linear infinite;
        }
        @keyframes spin { to { transform: rotate(360deg); } }

        .caption {
            display: none;
            margin-top: 20px;
            background: #f7f9ff;
            border-radius: 8px;
            padding: 16px;
            color: #333;
            line-height: 1.5;
        }
        .caption .label {
            color: #2d4a8a;
            font-weight: 600;
            font-size: 0.8em;
            text-transform: uppercase;
            letter-spacing: 1px;
            margin-bottom: 6px;
        }

        .error {
            display: none;
            margin-top: 20px;
            background: #fdecec;
            border: 1px solid #f5b5b5;
            color: #b03030;
            border-radius: 8px;
            padding: 14px;
        }
    </style>
</head>
<body>
    <div class="panel">
        <h1>Image Caption Generator</h1>
        <p class="subtitle">Upload an image and let the model describe it.</p>

        <div class="drop-zone" id="dropZone">
            <div>Click or drag an image here</div>
            <div class="hint">JPEG or PNG, up to 10 MB</div>
            <input type="file" id="fileInput" accept="image/*">
        </div>

        <div class="preview" id="preview">
            <img id="previewImage" alt="Selected image">
        </div>

        <button id="generateButton" disabled>Generate Caption</button>
        <div class="spinner" id="spinner"></div>

        <div class="caption" id="captionBox">
            <div class="label">Generated caption</div>
            <div id="captionText"></div>
        </div>
        <div class="error" id="errorBox"></div>
    </div>

    <script>
        const dropZone = document.getElementById('dropZone');
        const fileInput = document.getElementById('fileInput');
        const preview = document.getElementById('preview');
        const previewImage = document.getElementById('previewImage');
        const generateButton = document.getElementById('generateButton');
        const spinner = document.getElementById('spinner');
        const captionBox = document.getElementById('captionBox');
        const captionText = document.getElementById('captionText');
        const errorBox = document.getElementById('errorBox');

        let selectedFile = null;

        dropZone.addEventListener('click', () => fileInput.click());
        dropZone.addEventListener('dragover', (e) => {
            e.preventDefault();
            dropZone.classList.add('dragover');
        });
        dropZone.addEventListener('dragleave', () => dropZone.classList.remove('dragover'));
        dropZone.addEventListener('drop', (e) => {
            e.preventDefault();
            dropZone.classList.remove('dragover');
            const file = e.dataTransfer.files[0];
            if (file) selectFile(file);
        });
        fileInput.addEventListener('change', (e) => {
            const file = e.target.files[0];
            if (file) selectFile(file);
        });

        // a new selection supersedes the previous image and its result
        function selectFile(file) {
            selectedFile = file;
            captionBox.style.display = 'none';
            errorBox.style.display = 'none';
            const reader = new FileReader();
            reader.onload = (e) => {
                previewImage.src = e.target.result;
                preview.style.display = 'block';
            };
            reader.readAsDataURL(file);
            generateButton.disabled = false;
        }

        generateButton.addEventListener('click', async () => {
            if (!selectedFile) return;
            generateButton.disabled = true;
            spinner.style.display = 'block';
            captionBox.style.display = 'none';
            errorBox.style.display = 'none';

            const formData = new FormData();
            formData.append('image', selectedFile);

            try {
                const response = await fetch('/caption', { method: 'POST', body: formData });
                let body;
                try {
                    body = await response.json();
                } catch (_) {
                    body = { error: 'The server returned an unreadable response' };
                }
                if (response.ok && body.caption) {
                    captionText.textContent = body.caption;
                    captionBox.style.display = 'block';
                } else {
                    errorBox.textContent = body.error || 'Caption generation failed';
                    errorBox.style.display = 'block';
                }
            } catch (err) {
                errorBox.textContent = 'Could not reach the server';
                errorBox.style.display = 'block';
            } finally {
                spinner.style.display = 'none';
                generateButton.disabled = false;
            }
        });
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "ui-test-boundary";

    fn state_for(service_url: &str) -> Arc<UiState> {
        Arc::new(UiState {
            client: reqwest::Client::new(),
            caption_url: format!("{service_url}/generate_caption"),
        })
    }

    fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{field}\"; filename=\"probe.png\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/caption")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_serves_the_upload_page() {
        let app = router(state_for("http://127.0.0.1:9"));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("Generate Caption"));
    }

    #[tokio::test]
    async fn missing_file_never_reaches_the_service() {
        let app = router(state_for("http://127.0.0.1:9"));
        let response = app
            .oneshot(multipart_request("comment", b"no image here"))
            .await
            .unwrap();
        let (status, body) = response_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn non_multipart_body_is_rejected_as_missing_upload() {
        let app = router(state_for("http://127.0.0.1:9"));
        let request = Request::builder()
            .method("POST")
            .uri("/caption")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image": "zzz"}"#))
            .unwrap();
        let (status, body) = response_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn non_json_service_reply_becomes_a_displayable_error() {
        // stub service that answers with something no browser should see
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = Router::new().route(
            "/generate_caption",
            post(|| async { "<html>maintenance page</html>" }),
        );
        tokio::spawn(async move {
            axum::serve(listener, stub).await.unwrap();
        });

        let app = router(state_for(&format!("http://{addr}")));
        let response = app
            .oneshot(multipart_request("image", b"pretend pixels"))
            .await
            .unwrap();
        let (status, body) = response_json(response).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"],
            "Caption service returned an unreadable response"
        );
    }

    #[tokio::test]
    async fn unreachable_service_becomes_a_displayable_error() {
        // discard port, nothing listens there
        let app = router(state_for("http://127.0.0.1:9"));
        let response = app
            .oneshot(multipart_request("image", b"pretend pixels"))
            .await
            .unwrap();
        let (status, body) = response_json(response).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Could not reach the caption service");
    }
}
