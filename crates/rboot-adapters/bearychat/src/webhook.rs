//! Incoming-webhook client.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use rboot_core::{AdapterError, AdapterResult};
use tracing::{debug, warn};
use url::Url;

use crate::payload::{Response, WebhookReply};

/// Resolves the configured webhook into a URL.
///
/// An absolute `http`/`https` URL is used verbatim. Anything else is treated
/// as a hook token and appended as a path segment to `base_url`.
pub fn resolve_webhook_url(base_url: &str, webhook: &str) -> AdapterResult<Url> {
    let webhook = webhook.trim();
    if webhook.is_empty() {
        return Err(AdapterError::invalid_config("bearychat webhook is not set"));
    }

    if let Ok(url) = Url::parse(webhook)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(url);
    }

    let mut url = Url::parse(base_url)
        .map_err(|e| AdapterError::invalid_config(format!("invalid base_url '{base_url}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AdapterError::invalid_config(format!("base_url '{base_url}' cannot be a base")))?
        .pop_if_empty()
        .extend(webhook.trim_matches('/').split('/'));
    Ok(url)
}

/// Posts [`Response`] payloads to one webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: Url,
    retries: u32,
}

impl WebhookClient {
    /// Creates a client for `url`.
    pub fn new(url: Url, timeout: Duration, retries: u32) -> AdapterResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            retries,
        })
    }

    /// Returns the target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends `response`, retrying transport failures with a linear backoff.
    pub async fn send(&self, response: &Response) -> AdapterResult<()> {
        let mut attempt = 0;
        loop {
            match self.post(response).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Webhook call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, response: &Response) -> AdapterResult<()> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(response)
            .send()
            .await
            .map_err(|e| AdapterError::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::transport(format!(
                "HTTP {} error: {}",
                status.as_u16(),
                text
            )));
        }

        // BearyChat reports some failures with a 200 and a non-zero code.
        let reply: WebhookReply = resp.json().await.unwrap_or_default();
        if reply.code != 0 {
            return Err(AdapterError::transport(format!(
                "webhook rejected message (code {}): {}",
                reply.code,
                reply.error.unwrap_or_default()
            )));
        }

        debug!(len = response.text.len(), "Webhook message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::{Json, Router, routing::post};
    use parking_lot::Mutex;
    use rboot_core::Message;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    /// Serves `router` on an ephemeral local port and returns its hook URL.
    async fn serve_hook(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{addr}/hook")).unwrap()
    }

    fn client(url: Url, retries: u32) -> WebhookClient {
        WebhookClient::new(url, Duration::from_secs(5), retries).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_json_payload() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = seen.clone();
        let url = serve_hook(Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *sink.lock() = Some((content_type, body));
                Json(json!({ "code": 0 }))
            }),
        ))
        .await;

        client(url, 0)
            .send(&Response::from_message(&Message::new("pong")))
            .await
            .unwrap();

        let (content_type, body) = seen.lock().take().unwrap();
        assert_eq!(content_type, "application/json");
        assert_eq!(body["text"], "pong");
    }

    #[tokio::test]
    async fn test_error_status_fails_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let url = serve_hook(Router::new().route(
            "/hook",
            post(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::NOT_FOUND, "no such hook")
            }),
        ))
        .await;

        let err = client(url, 0)
            .send(&Response::from_message(&Message::new("pong")))
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Transport(ref msg) if msg.contains("404")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nonzero_code_is_failure() {
        let url = serve_hook(Router::new().route(
            "/hook",
            post(|| async { Json(json!({ "code": 1, "error": "invalid hook" })) }),
        ))
        .await;

        let err = client(url, 0)
            .send(&Response::from_message(&Message::new("pong")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AdapterError::Transport(ref msg) if msg.contains("code 1") && msg.contains("invalid hook")
        ));
    }

    #[tokio::test]
    async fn test_failed_call_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let url = serve_hook(Router::new().route(
            "/hook",
            post(move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::INTERNAL_SERVER_ERROR, "busy").into_response()
                } else {
                    Json(json!({ "code": 0 })).into_response()
                }
            }),
        ))
        .await;

        client(url, 1)
            .send(&Response::from_message(&Message::new("pong")))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let url = serve_hook(Router::new().route(
            "/hook",
            post(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::BAD_GATEWAY
            }),
        ))
        .await;

        let result = client(url, 1)
            .send(&Response::from_message(&Message::new("pong")))
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_absolute_url_used_verbatim() {
        let url = resolve_webhook_url(
            DEFAULT_BASE_URL,
            "https://hook.bearychat.com/=bw8NI/incoming/abc",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://hook.bearychat.com/=bw8NI/incoming/abc");

        let url = resolve_webhook_url(DEFAULT_BASE_URL, "http://localhost:8080/hook").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/hook");
    }

    #[test]
    fn test_token_joined_onto_base() {
        let url = resolve_webhook_url(DEFAULT_BASE_URL, "=bw8NI/incoming/abc").unwrap();
        assert_eq!(url.as_str(), "https://hook.bearychat.com/=bw8NI/incoming/abc");

        let url = resolve_webhook_url("https://proxy.local/bearychat/", "/abc").unwrap();
        assert_eq!(url.as_str(), "https://proxy.local/bearychat/abc");
    }

    #[test]
    fn test_empty_webhook_rejected() {
        assert!(matches!(
            resolve_webhook_url(DEFAULT_BASE_URL, "  "),
            Err(AdapterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(resolve_webhook_url("not a url", "abc").is_err());
    }
}
