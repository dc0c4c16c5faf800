//! Relay HTTP server (single port).
//!
//! - `POST /send`: send a text message or a file to a WhatsApp contact.
//!   Accepts `multipart/form-data` (fields `phone`, `caption`, `message`,
//!   `file`) or a JSON object with the same text fields.
//! - `GET /status`: current session state.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::relay::dispatch::{dispatch, SendRequest, UploadedFile};
use crate::relay::RelayError;
use crate::whatsapp::session::SessionHandle;

/// Shared state for request handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<SessionHandle>,
}

/// Text fields of a JSON send request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendFields {
    phone: Option<Value>,
    caption: Option<String>,
    message: Option<String>,
}

impl From<SendFields> for SendRequest {
    fn from(fields: SendFields) -> Self {
        // Phone numbers are often posted as JSON numbers.
        let phone = fields.phone.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self {
            phone,
            caption: fields.caption,
            message: fields.message,
            file: None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the relay router.
///
/// `max_upload_bytes` bounds the request body (and therefore the file size).
pub fn router(session: Arc<SessionHandle>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/send", post(send))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState { session })
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener address cannot be read or the server
/// fails.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "relay HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("relay HTTP server failed")?;
    info!("relay HTTP server stopped");
    Ok(())
}

async fn send(State(state): State<AppState>, request: Request) -> Result<Json<Value>, RelayError> {
    debug!("/send received");
    let send_request = read_send_request(request).await?;
    match dispatch(state.session.client(), send_request).await {
        Ok(outcome) => Ok(Json(json!({ "status": outcome.status() }))),
        Err(e) => {
            if let RelayError::Dispatch(message) = &e {
                error!(error = %message, "send failed");
            }
            Err(e)
        }
    }
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let session = state.session.state();
    Json(json!({
        "session": session.label(),
        "detail": session.to_string(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Parse the body according to its content type. Bodies of any other type
/// yield an empty request, which fails validation.
async fn read_send_request(request: Request) -> Result<SendRequest, RelayError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| RelayError::Validation(e.body_text()))?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/json") {
        let Json(fields) = Json::<SendFields>::from_request(request, &())
            .await
            .map_err(|e| RelayError::Validation(e.body_text()))?;
        Ok(fields.into())
    } else {
        Ok(SendRequest::default())
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<SendRequest, RelayError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        RelayError::Validation(format!("malformed multipart body: {e}"))
    };

    let mut request = SendRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_owned);
                let mimetype = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(malformed)?;
                request.file = Some(UploadedFile {
                    bytes: bytes.to_vec(),
                    filename,
                    mimetype,
                });
            }
            "phone" => request.phone = Some(field.text().await.map_err(malformed)?),
            "caption" => request.caption = Some(field.text().await.map_err(malformed)?),
            "message" => request.message = Some(field.text().await.map_err(malformed)?),
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(request)
}
