//! Adapter trait and message pipes.
//!
//! Adapters bridge a chat transport with the dispatcher. Each adapter exposes
//! two unidirectional streams of [`Message`]:
//!
//! - **incoming**: messages received from the transport, handed out once
//! - **outgoing**: sink the dispatcher publishes replies onto
//!
//! # Architecture
//!
//! ```text
//! Transport ──▶ inbound tx ══ AdapterPipes ══ incoming() ──▶ Dispatcher
//! Transport ◀── outbound rx ══ AdapterPipes ══ outgoing() ◀── Dispatcher
//! ```
//!
//! Adapters own delivery, retries and formatting. The core never looks at
//! transport details.
//!
//! # Example
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Adapter for MyAdapter {
//!     fn name(&self) -> &str { "my" }
//!
//!     async fn on_start(&self) -> AdapterResult<()> {
//!         let (inbound, mut outbound) = self.pipes.take_transport()?;
//!         tokio::spawn(async move {
//!             while let Some(msg) = outbound.recv().await {
//!                 deliver(msg).await;
//!             }
//!         });
//!         Ok(())
//!     }
//!
//!     fn incoming(&self) -> AdapterResult<mpsc::Receiver<Message>> {
//!         self.pipes.take_incoming()
//!     }
//!
//!     fn outgoing(&self) -> mpsc::Sender<Message> {
//!         self.pipes.outgoing()
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::foundation::{AdapterError, AdapterResult, Contacts, Message, User};

// =============================================================================
// Adapter Trait
// =============================================================================

/// The transport adapter contract.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter identifier.
    fn name(&self) -> &str;

    /// Called once before the dispatcher starts consuming.
    ///
    /// Spawn the transport tasks (readers, HTTP servers, writers) here.
    async fn on_start(&self) -> AdapterResult<()>;

    /// Hands out the inbound stream.
    ///
    /// Succeeds once; later calls fail with [`AdapterError::IncomingTaken`].
    /// The stream closes when the transport disconnects.
    fn incoming(&self) -> AdapterResult<mpsc::Receiver<Message>>;

    /// Returns the outbound sink.
    fn outgoing(&self) -> mpsc::Sender<Message>;

    /// Called when the runtime is shutting down.
    async fn on_shutdown(&self) -> AdapterResult<()> {
        Ok(())
    }
}

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// Settings the runtime passes to every adapter it creates.
#[derive(Debug, Clone)]
pub struct AdapterInit {
    /// The bot's own identity, used as the recipient of inbound messages.
    pub bot: User,
    /// Capacity of the inbound and outbound channels.
    pub channel_capacity: usize,
    /// Roster shared with scripts; adapters push the users they know.
    pub contacts: Contacts,
}

impl Default for AdapterInit {
    fn default() -> Self {
        Self {
            bot: User::with_id("rboot"),
            channel_capacity: 64,
            contacts: Contacts::new(),
        }
    }
}

/// Trait for adapters that can be created from configuration.
///
/// Separates compile-time concerns (`Config` type, `from_config()`)
/// from the object-safe [`Adapter`] trait.
pub trait ConfigurableAdapter: Adapter {
    /// The identifier used for selection and as the config key
    /// (`[adapters.<NAME>]`).
    const NAME: &'static str;

    /// The configuration type.
    type Config: serde::de::DeserializeOwned + Default;

    /// Creates an adapter instance from its deserialized configuration.
    fn from_config(config: Self::Config, init: AdapterInit) -> AdapterResult<Arc<Self>>
    where
        Self: Sized;
}

// =============================================================================
// Adapter Pipes
// =============================================================================

/// The pair of bounded channels between a transport and the dispatcher.
///
/// Both receivers and the inbound sender are take-once. The inbound sender is
/// meant to be moved into the transport task so that the inbound stream closes
/// when the transport ends.
pub struct AdapterPipes {
    adapter: String,
    inbound_tx: Mutex<Option<mpsc::Sender<Message>>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    outbound_tx: mpsc::Sender<Message>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl AdapterPipes {
    /// Creates the channels for `adapter` with the given capacity.
    pub fn new(adapter: impl Into<String>, capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        Self {
            adapter: adapter.into(),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
        }
    }

    /// Takes the dispatcher side of the inbound stream.
    pub fn take_incoming(&self) -> AdapterResult<mpsc::Receiver<Message>> {
        self.inbound_rx
            .lock()
            .take()
            .ok_or_else(|| AdapterError::IncomingTaken {
                adapter: self.adapter.clone(),
            })
    }

    /// Returns a sender onto the outbound stream.
    pub fn outgoing(&self) -> mpsc::Sender<Message> {
        self.outbound_tx.clone()
    }

    /// Takes the transport side: the inbound sender and the outbound receiver.
    pub fn take_transport(
        &self,
    ) -> AdapterResult<(mpsc::Sender<Message>, mpsc::Receiver<Message>)> {
        let taken = || AdapterError::TransportTaken {
            adapter: self.adapter.clone(),
        };
        let mut inbound = self.inbound_tx.lock();
        let mut outbound = self.outbound_rx.lock();
        if inbound.is_none() || outbound.is_none() {
            return Err(taken());
        }
        match (inbound.take(), outbound.take()) {
            (Some(tx), Some(rx)) => Ok((tx, rx)),
            _ => Err(taken()),
        }
    }
}

impl std::fmt::Debug for AdapterPipes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterPipes")
            .field("adapter", &self.adapter)
            .field("incoming_taken", &self.inbound_rx.lock().is_none())
            .field("transport_taken", &self.outbound_rx.lock().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_is_take_once() {
        let pipes = AdapterPipes::new("test", 4);

        assert!(pipes.take_incoming().is_ok());
        let err = pipes.take_incoming().unwrap_err();
        assert!(matches!(err, AdapterError::IncomingTaken { ref adapter } if adapter == "test"));
    }

    #[test]
    fn test_transport_is_take_once() {
        let pipes = AdapterPipes::new("test", 4);

        assert!(pipes.take_transport().is_ok());
        assert!(matches!(
            pipes.take_transport(),
            Err(AdapterError::TransportTaken { .. })
        ));
    }

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let pipes = AdapterPipes::new("test", 4);
        let mut incoming = pipes.take_incoming().unwrap();
        let (inbound, mut outbound) = pipes.take_transport().unwrap();

        inbound.send(Message::new("in")).await.unwrap();
        assert_eq!(incoming.recv().await.unwrap().content, "in");

        pipes.outgoing().send(Message::new("out")).await.unwrap();
        assert_eq!(outbound.recv().await.unwrap().content, "out");
    }

    #[tokio::test]
    async fn test_incoming_closes_with_transport() {
        let pipes = AdapterPipes::new("test", 4);
        let mut incoming = pipes.take_incoming().unwrap();
        let (inbound, _outbound) = pipes.take_transport().unwrap();

        drop(inbound);
        assert!(incoming.recv().await.is_none());
    }
}
