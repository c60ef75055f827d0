//! BearyChat adapter.
//!
//! Inbound messages arrive through the outgoing-robot endpoint; replies are
//! posted to the incoming webhook one at a time, in the order the dispatcher
//! published them.
//!
//! A reply without `channel` or `user` headers goes to the channel its
//! recipient last spoke in.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rboot_core::{
    Adapter, AdapterError, AdapterInit, AdapterPipes, AdapterResult, ConfigurableAdapter,
    Contacts, Message, User,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::BearyChatConfig;
use crate::payload::Response;
use crate::server::{self, Routes, ServerState};
use crate::webhook::{WebhookClient, resolve_webhook_url};

/// The BearyChat adapter.
pub struct BearyChatAdapter {
    config: BearyChatConfig,
    bot: User,
    webhook: WebhookClient,
    pipes: AdapterPipes,
    routes: Routes,
    contacts: Contacts,
    local_addr: Mutex<Option<SocketAddr>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl BearyChatAdapter {
    /// Creates the adapter, resolving the webhook URL.
    ///
    /// Fails with [`AdapterError::InvalidConfig`] when no webhook is set.
    pub fn new(config: BearyChatConfig, init: AdapterInit) -> AdapterResult<Arc<Self>> {
        let url = resolve_webhook_url(&config.base_url, &config.webhook)?;
        let webhook = WebhookClient::new(url, config.timeout(), config.retries)?;

        Ok(Arc::new(Self {
            config,
            bot: init.bot,
            webhook,
            pipes: AdapterPipes::new(Self::NAME, init.channel_capacity),
            routes: Routes::default(),
            contacts: init.contacts,
            local_addr: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }))
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &BearyChatConfig {
        &self.config
    }

    /// Returns the webhook client.
    pub fn webhook(&self) -> &WebhookClient {
        &self.webhook
    }

    /// Returns the bound endpoint address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

#[async_trait]
impl Adapter for BearyChatAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_start(&self) -> AdapterResult<()> {
        let listener = TcpListener::bind(self.config.listen.as_str()).await?;
        let addr = listener.local_addr()?;
        let (inbound, outbound) = self.pipes.take_transport()?;
        *self.local_addr.lock() = Some(addr);

        let path = self.config.normalized_path();
        let router = server::router(
            &path,
            ServerState {
                inbound,
                bot: self.bot.clone(),
                token: self.config.token.clone().filter(|t| !t.is_empty()),
                routes: self.routes.clone(),
                contacts: self.contacts.clone(),
            },
        );

        let server_task = tokio::spawn(server::serve(listener, router, self.shutdown.clone()));
        let delivery_task = tokio::spawn(deliver(
            self.webhook.clone(),
            outbound,
            self.routes.clone(),
            self.shutdown.clone(),
        ));
        self.tasks.lock().extend([server_task, delivery_task]);

        info!(
            addr = %addr,
            path = %path,
            webhook = %self.webhook.url().host_str().unwrap_or_default(),
            "BearyChat adapter listening"
        );
        Ok(())
    }

    fn incoming(&self) -> AdapterResult<mpsc::Receiver<Message>> {
        self.pipes.take_incoming()
    }

    fn outgoing(&self) -> mpsc::Sender<Message> {
        self.pipes.outgoing()
    }

    async fn on_shutdown(&self) -> AdapterResult<()> {
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.await
                .map_err(|e| AdapterError::internal(format!("BearyChat task failed: {e}")))?;
        }
        debug!("BearyChat adapter stopped");
        Ok(())
    }
}

impl ConfigurableAdapter for BearyChatAdapter {
    const NAME: &'static str = "bearychat";
    type Config = BearyChatConfig;

    fn from_config(config: BearyChatConfig, init: AdapterInit) -> AdapterResult<Arc<Self>> {
        Self::new(config, init)
    }
}

impl std::fmt::Debug for BearyChatAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearyChatAdapter")
            .field("listen", &self.config.listen)
            .field("path", &self.config.path)
            .field("bot", &self.bot)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Posts replies until shutdown, then delivers whatever is still queued.
async fn deliver(
    webhook: WebhookClient,
    mut outbound: mpsc::Receiver<Message>,
    routes: Routes,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
            _ = shutdown.cancelled() => {
                outbound.close();
                while let Ok(message) = outbound.try_recv() {
                    deliver_one(&webhook, &routes, message).await;
                }
                break;
            }
        };

        deliver_one(&webhook, &routes, message).await;
    }
}

async fn deliver_one(webhook: &WebhookClient, routes: &Routes, message: Message) {
    let response = address(&message, routes);
    if let Err(e) = webhook.send(&response).await {
        error!(to = %message.to.id, content = %message.content, error = %e, "Failed to deliver message");
    }
}

/// Builds the payload, falling back to the recipient's last channel.
fn address(message: &Message, routes: &Routes) -> Response {
    let mut response = Response::from_message(message);
    if response.channel.is_none() && response.user.is_none() {
        response.channel = routes.lock().get(&message.to.id).cloned();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{CHANNEL_HEADER, USER_HEADER};

    fn init() -> AdapterInit {
        AdapterInit {
            bot: User::with_id("Rboot"),
            channel_capacity: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_webhook_is_invalid_config() {
        let result = BearyChatAdapter::new(BearyChatConfig::default(), init());
        assert!(matches!(result, Err(AdapterError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_config_resolves_token() {
        let config = BearyChatConfig {
            webhook: "abc123".into(),
            ..Default::default()
        };
        let adapter = BearyChatAdapter::from_config(config, init()).unwrap();

        assert_eq!(adapter.name(), "bearychat");
        assert_eq!(
            adapter.webhook().url().as_str(),
            "https://hook.bearychat.com/abc123"
        );
        assert!(adapter.local_addr().is_none());
    }

    #[test]
    fn test_reply_falls_back_to_last_channel() {
        let routes = Routes::default();
        routes.lock().insert("alice".into(), "general".into());

        let reply = Message::new("pong").with_to(User::with_id("alice"));
        assert_eq!(address(&reply, &routes).channel.as_deref(), Some("general"));

        let explicit = reply.clone().with_header(CHANNEL_HEADER, "ops");
        assert_eq!(address(&explicit, &routes).channel.as_deref(), Some("ops"));

        let direct = reply.with_header(USER_HEADER, "alice");
        let response = address(&direct, &routes);
        assert_eq!(response.channel, None);
        assert_eq!(response.user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_incoming() {
        let config = BearyChatConfig {
            webhook: "abc123".into(),
            listen: "127.0.0.1:0".into(),
            ..Default::default()
        };
        let adapter = BearyChatAdapter::new(config, init()).unwrap();
        let mut incoming = adapter.incoming().unwrap();

        adapter.on_start().await.unwrap();
        assert!(adapter.local_addr().is_some_and(|addr| addr.port() != 0));

        adapter.on_shutdown().await.unwrap();
        assert!(incoming.recv().await.is_none());
    }
}
