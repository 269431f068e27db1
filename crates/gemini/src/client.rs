//! HTTP client for `models/{model}:generateContent`

use provider::{AttemptOutcome, Backend, Credential, ErrorClassification};
use reqwest::header::{HeaderName, HeaderValue};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::constants::API_KEY_HEADER;
use crate::error::{Error, Result};
use crate::quota::classify_status;
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Longest slice of an upstream error body kept in a failure detail.
const MAX_DETAIL_CHARS: usize = 200;

/// Gemini backend: one POST per attempt, no retries.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiBackend {
    /// Build a backend with its own client. `timeout` bounds each attempt
    /// end to end; an attempt that hits it is a transient failure.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self::with_client(client, base_url, model))
    }

    /// Build a backend around an existing client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn send(&self, credential: &Credential, prompt: &str) -> AttemptOutcome {
        let key = match HeaderValue::from_str(credential.expose()) {
            Ok(v) => v,
            Err(e) => {
                return AttemptOutcome::TransientFailure(format!("api key is not a valid header value: {e}"));
            }
        };

        let response = match self
            .client
            .post(self.endpoint())
            .header(HeaderName::from_static(API_KEY_HEADER), key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return AttemptOutcome::TransientFailure(format!("request timed out: {e}"));
            }
            Err(e) => return AttemptOutcome::TransientFailure(format!("request failed: {e}")),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return AttemptOutcome::TransientFailure(format!("failed to read response body: {e}"));
            }
        };

        if !status.is_success() {
            let classification = classify_status(status.as_u16(), &body);
            debug!(
                status = status.as_u16(),
                classification = classification.label(),
                "backend returned error status"
            );
            return AttemptOutcome::failure(
                classification,
                format!("backend returned {status}: {}", truncate(&body)),
            );
        }

        let parsed: GenerateContentResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) => {
                return AttemptOutcome::failure(
                    ErrorClassification::Transient,
                    format!("malformed response: {e}"),
                );
            }
        };

        match parsed.text() {
            Ok(text) => AttemptOutcome::Success(text),
            Err(detail) => AttemptOutcome::TransientFailure(detail),
        }
    }
}

impl Backend for GeminiBackend {
    fn id(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(
        &'a self,
        credential: &'a Credential,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
        Box::pin(self.send(credential, prompt))
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::net::TcpListener;

    /// Start a mock upstream answering every request with `status` and `body`.
    async fn start_upstream(status: StatusCode, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let app = axum::Router::new().fallback(move || async move {
                (
                    status,
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
            });
            axum::serve(listener, app).await.unwrap();
        });
        url
    }

    /// Start a mock upstream that answers with the request path, API key and
    /// prompt joined by `|`, so tests can see what went on the wire.
    async fn start_echo_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let app = axum::Router::new().fallback(|request: Request<Body>| async move {
                let path = request.uri().path().to_string();
                let key = request
                    .headers()
                    .get(API_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
                    .await
                    .unwrap();
                let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                let prompt = json["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or("")
                    .to_string();
                axum::Json(serde_json::json!({
                    "candidates": [{"content": {"parts": [{"text": format!("{path}|{key}|{prompt}")}]}}]
                }))
            });
            axum::serve(listener, app).await.unwrap();
        });
        url
    }

    fn backend(url: &str) -> GeminiBackend {
        GeminiBackend::new(url, "gemini-2.0-flash-lite", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn success_sends_key_model_and_prompt() {
        let url = start_echo_upstream().await;
        let outcome = backend(&url)
            .generate(&Credential::new("AIza-k0"), "persona\n\nhola")
            .await;
        assert_eq!(
            outcome,
            AttemptOutcome::Success(
                "/models/gemini-2.0-flash-lite:generateContent|AIza-k0|persona\n\nhola".into()
            )
        );
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_ignored() {
        let url = start_echo_upstream().await;
        let outcome = backend(&format!("{url}/"))
            .generate(&Credential::new("k"), "p")
            .await;
        match outcome {
            AttemptOutcome::Success(text) => {
                assert!(text.starts_with("/models/"), "got: {text}")
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn quota_response_is_quota_exceeded() {
        let url = start_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .await;
        let outcome = backend(&url).generate(&Credential::new("k"), "p").await;
        assert!(
            matches!(outcome, AttemptOutcome::QuotaExceeded(ref d) if d.contains("429")),
            "got: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let url = start_upstream(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"code":500,"status":"INTERNAL"}}"#,
        )
        .await;
        let outcome = backend(&url).generate(&Credential::new("k"), "p").await;
        assert!(matches!(outcome, AttemptOutcome::TransientFailure(_)), "got: {outcome:?}");
    }

    #[tokio::test]
    async fn empty_text_is_success() {
        let url = start_upstream(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        )
        .await;
        let outcome = backend(&url).generate(&Credential::new("k"), "p").await;
        assert_eq!(outcome, AttemptOutcome::Success(String::new()));
    }

    #[tokio::test]
    async fn malformed_body_is_transient() {
        let url = start_upstream(StatusCode::OK, "not json").await;
        let outcome = backend(&url).generate(&Credential::new("k"), "p").await;
        assert!(
            matches!(outcome, AttemptOutcome::TransientFailure(ref d) if d.contains("malformed")),
            "got: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn blocked_prompt_is_transient() {
        let url = start_upstream(StatusCode::OK, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).await;
        let outcome = backend(&url).generate(&Credential::new("k"), "p").await;
        assert_eq!(
            outcome,
            AttemptOutcome::TransientFailure("prompt blocked: SAFETY".into())
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_transient() {
        let outcome = backend("http://127.0.0.1:1")
            .generate(&Credential::new("k"), "p")
            .await;
        assert!(matches!(outcome, AttemptOutcome::TransientFailure(_)), "got: {outcome:?}");
    }

    #[tokio::test]
    async fn slow_backend_times_out_as_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let app = axum::Router::new().fallback(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            });
            axum::serve(listener, app).await.unwrap();
        });

        let backend =
            GeminiBackend::new(&url, "gemini-2.0-flash-lite", Duration::from_millis(100)).unwrap();
        let outcome = backend.generate(&Credential::new("k"), "p").await;
        assert!(
            matches!(outcome, AttemptOutcome::TransientFailure(ref d) if d.contains("timed out")),
            "got: {outcome:?}"
        );
    }

    #[test]
    fn truncate_limits_long_bodies() {
        let long = "x".repeat(500);
        let detail = truncate(&long);
        assert_eq!(detail.len(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn backend_reports_id_and_model() {
        let backend = backend("http://unused");
        assert_eq!(backend.id(), "gemini");
        assert_eq!(backend.model(), "gemini-2.0-flash-lite");
    }
}
