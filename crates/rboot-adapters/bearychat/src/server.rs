//! Outgoing-robot endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::post,
};
use parking_lot::Mutex;
use rboot_core::{Contacts, Message, User};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::payload::{CHANNEL_HEADER, OutgoingRequest};

/// Last channel each user spoke in, keyed by user id.
///
/// Holds one entry per distinct sender, overwritten on every message and never
/// removed, so it grows with the team's roster rather than with traffic.
pub(crate) type Routes = Arc<Mutex<HashMap<String, String>>>;

/// Shared state for the endpoint.
#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) inbound: mpsc::Sender<Message>,
    pub(crate) bot: User,
    pub(crate) token: Option<String>,
    pub(crate) routes: Routes,
    pub(crate) contacts: Contacts,
}

pub(crate) fn router(path: &str, state: ServerState) -> Router {
    Router::new()
        .route(path, post(handle_outgoing))
        .with_state(state)
}

/// Serves until `shutdown` is cancelled. The router, and with it the inbound
/// sender, is dropped on return.
pub(crate) async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) {
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;

    match result {
        Ok(()) => info!("BearyChat endpoint shut down"),
        Err(e) => error!(error = %e, "BearyChat endpoint error"),
    }
}

async fn handle_outgoing(
    State(state): State<ServerState>,
    Json(request): Json<OutgoingRequest>,
) -> HttpResponse {
    if let Some(expected) = &state.token
        && request.token.as_deref() != Some(expected.as_str())
    {
        warn!(user = ?request.user_name, "Rejected request with invalid token");
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    let message = request.into_message(&state.bot);
    if message.content.is_empty() {
        return Json(json!({})).into_response();
    }

    if let Some(channel) = message.header(CHANNEL_HEADER) {
        state
            .routes
            .lock()
            .insert(message.from.id.clone(), channel.to_string());
    }
    // The webhook API offers no roster, so senders are learned as they speak.
    if state.contacts.add(message.from.clone()) {
        debug!(user = %message.from.id, "BearyChat contact added");
    }

    trace!(from = %message.from.id, content = %message.content, "BearyChat message received");

    match state.inbound.send(message).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "bot is shutting down").into_response(),
    }
}
