//! Event stream: a publish/subscribe path independent of message matching.
//!
//! Subscribers are registered by topic before the stream starts. The consume
//! loop hands each event to every subscriber whose topic equals the event name,
//! or is the wildcard [`WILDCARD_TOPIC`]. Each delivery runs on its own task;
//! a failing or panicking subscriber is logged and does not affect the others.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut events = EventStream::new(64);
//! events.subscribe("rboot.started", |event: Event, ctx: EventContext| async move {
//!     ctx.send(Message::new("hello").with_to(admin)).await?;
//!     Ok(())
//! });
//!
//! let publisher = events.publisher();
//! let handle = events.start(ctx, shutdown.clone());
//! publisher.publish(Event::new("rboot.started")).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::foundation::{Contacts, EventError, EventResult, Message, ScriptError, ScriptResult};
use crate::memorizer::BoxedMemorizer;
use crate::script::BoxFuture;

/// Topic that receives every event.
pub const WILDCARD_TOPIC: &str = "*";

// =============================================================================
// Event
// =============================================================================

/// A named event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, matched against subscriber topics.
    pub name: String,
    /// Event data.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Creates an event without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Attaches a payload (builder pattern).
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// =============================================================================
// Subscriber
// =============================================================================

/// What subscribers can reach while handling an event.
#[derive(Clone)]
pub struct EventContext {
    memorizer: BoxedMemorizer,
    outgoing: mpsc::Sender<Message>,
    contacts: Contacts,
}

impl EventContext {
    /// Creates a context.
    pub fn new(memorizer: BoxedMemorizer, outgoing: mpsc::Sender<Message>) -> Self {
        Self {
            memorizer,
            outgoing,
            contacts: Contacts::new(),
        }
    }

    /// Shares the adapter's roster with subscribers (builder pattern).
    pub fn with_contacts(mut self, contacts: Contacts) -> Self {
        self.contacts = contacts;
        self
    }

    /// Returns the shared memorizer.
    pub fn memorizer(&self) -> &BoxedMemorizer {
        &self.memorizer
    }

    /// Returns the users known to the adapter.
    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    /// Publishes a message to the outbound stream as-is.
    ///
    /// Events have no triggering sender, so the caller addresses the message.
    pub async fn send(&self, message: Message) -> ScriptResult<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| ScriptError::OutboundClosed)
    }
}

/// An event handler.
pub trait Subscriber: Send + Sync + 'static {
    /// Handles one event.
    fn call(&self, event: Event, ctx: EventContext) -> BoxFuture<'static, ScriptResult<()>>;
}

impl<F, Fut> Subscriber for F
where
    F: Fn(Event, EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScriptResult<()>> + Send + 'static,
{
    fn call(&self, event: Event, ctx: EventContext) -> BoxFuture<'static, ScriptResult<()>> {
        (self)(event, ctx).boxed()
    }
}

/// A type-erased subscriber.
pub type BoxedSubscriber = Arc<dyn Subscriber>;

// =============================================================================
// Publisher
// =============================================================================

/// Cloneable handle for publishing events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<Event>,
}

impl EventPublisher {
    /// Queues an event, waiting for capacity.
    ///
    /// Fails with [`EventError::Closed`] once the stream has ended.
    pub async fn publish(&self, event: Event) -> EventResult<()> {
        self.tx.send(event).await.map_err(|_| EventError::Closed)
    }

    /// Queues an event by name with a payload.
    pub async fn emit(
        &self,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> EventResult<()> {
        self.publish(Event::new(name).with_payload(payload)).await
    }

    /// Returns true if the stream has ended.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// Event Stream
// =============================================================================

/// Subscriptions plus the queue feeding the consume loop.
pub struct EventStream {
    subscribers: Vec<(String, BoxedSubscriber)>,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
}

impl EventStream {
    /// Creates a stream whose queue holds up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            subscribers: Vec::new(),
            tx,
            rx,
        }
    }

    /// Registers `subscriber` for `topic`.
    pub fn subscribe(&mut self, topic: impl Into<String>, subscriber: impl Subscriber) {
        let topic = topic.into();
        debug!(topic = %topic, "Event subscriber registered");
        self.subscribers.push((topic, Arc::new(subscriber)));
    }

    /// Returns a publishing handle.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    /// Returns the number of subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Starts the consume loop.
    ///
    /// The loop runs until `shutdown` is cancelled or every publisher is
    /// dropped. Events already queued at cancellation are still delivered,
    /// and the returned handle resolves after all deliveries finished.
    pub fn start(self, ctx: EventContext, shutdown: CancellationToken) -> JoinHandle<()> {
        let Self {
            subscribers,
            tx,
            mut rx,
        } = self;
        drop(tx);

        tokio::spawn(async move {
            let mut deliveries = JoinSet::new();

            loop {
                while let Some(joined) = deliveries.try_join_next() {
                    log_delivery(joined);
                }

                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                deliver(&subscribers, event, &ctx, &mut deliveries);
            }

            rx.close();
            while let Ok(event) = rx.try_recv() {
                deliver(&subscribers, event, &ctx, &mut deliveries);
            }
            while let Some(joined) = deliveries.join_next().await {
                log_delivery(joined);
            }
            debug!("Event stream stopped");
        })
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field(
                "topics",
                &self.subscribers.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            )
            .finish()
    }
}

type Delivery = (String, ScriptResult<()>);

fn deliver(
    subscribers: &[(String, BoxedSubscriber)],
    event: Event,
    ctx: &EventContext,
    deliveries: &mut JoinSet<Delivery>,
) {
    let mut delivered = 0;
    for (topic, subscriber) in subscribers {
        if topic != WILDCARD_TOPIC && *topic != event.name {
            continue;
        }
        let fut = subscriber.call(event.clone(), ctx.clone());
        let name = event.name.clone();
        deliveries.spawn(async move { (name, fut.await) });
        delivered += 1;
    }
    trace!(event = %event.name, subscribers = delivered, "Event dispatched");
}

fn log_delivery(joined: Result<Delivery, tokio::task::JoinError>) {
    match joined {
        Ok((_, Ok(()))) => {}
        Ok((event, Err(e))) => error!(event = %event, error = %e, "Event subscriber failed"),
        Err(e) => error!(error = %e, "Event subscriber panicked"),
    }
}
