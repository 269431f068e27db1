//! Contact form intake and capped JSON storage
//!
//! Messages are kept as a pretty-printed JSON array in a single file. Each
//! append rewrites the file through a temp file + rename and drops the
//! oldest entries beyond `max_messages`.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::AppState;
use crate::api::reply;
use crate::error::{Error, Result};

/// Largest contact form body accepted.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// A stored contact message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub timestamp: String,
    pub ip: Option<String>,
}

/// Raw form fields as submitted (JSON or urlencoded).
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ContactForm {
    /// Trim every field and reject the first one that is missing or blank.
    pub fn into_message(self, timestamp: String, ip: Option<String>) -> Result<ContactMessage> {
        fn required(field: &str, value: Option<String>) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(Error::Validation(format!("The field {field} is required"))),
            }
        }

        Ok(ContactMessage {
            name: required("name", self.name)?,
            email: required("email", self.email)?,
            subject: required("subject", self.subject)?,
            message: required("message", self.message)?,
            timestamp,
            ip,
        })
    }
}

/// Append-only contact log capped at `max_messages` entries.
pub struct ContactStore {
    path: PathBuf,
    max_messages: usize,
    write_lock: Mutex<()>,
}

impl ContactStore {
    pub fn new(path: PathBuf, max_messages: usize) -> Self {
        Self {
            path,
            max_messages,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the parent directory and an empty `[]` file if missing.
    pub async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, b"[]").await?;
            info!(path = %self.path.display(), "created contact store");
        }
        Ok(())
    }

    /// All stored messages, oldest first. A missing file is an empty store.
    pub async fn list(&self) -> Result<Vec<ContactMessage>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append `record`, dropping the oldest entries beyond the cap.
    pub async fn append(&self, record: ContactMessage) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut messages = self.list().await?;
        messages.push(record);
        if messages.len() > self.max_messages {
            let excess = messages.len() - self.max_messages;
            messages.drain(..excess);
        }

        self.init().await?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&messages)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Parse a JSON or urlencoded body into form fields.
fn parse_form(content_type: &str, body: &[u8]) -> Result<ContactForm> {
    if content_type.starts_with("application/json") {
        serde_json::from_slice(body).map_err(|e| Error::Validation(format!("invalid JSON: {e}")))
    } else {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| Error::Validation(format!("invalid form data: {e}")))
    }
}

/// `POST /contact`
pub async fn contact_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    handle_contact(&state, request, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id))]
async fn handle_contact(state: &AppState, request: Request<Body>, request_id: String) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to read contact body");
            return reply(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"success": false, "message": "Invalid form data"}),
            );
        }
    };

    let record = match parse_form(&content_type, &body)
        .and_then(|form| form.into_message(chrono::Local::now().to_rfc3339(), ip))
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "rejected contact submission");
            let message = match e {
                Error::Validation(ref m) if m.starts_with("The field") => m.clone(),
                _ => "Invalid form data".to_string(),
            };
            return reply(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"success": false, "message": message}),
            );
        }
    };

    if let Err(e) = state.contacts.append(record.clone()).await {
        state
            .metrics
            .errors_total
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        error!(error = %e, "failed to store contact message");
        return reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "success": false,
                "message": "Internal server error. Please try again later.",
            }),
        );
    }

    info!(subject = %record.subject, "contact message stored");
    reply(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "message": "Message received. We will contact you soon.",
            "received_data": record,
        }),
    )
}
