//! Message dispatcher.
//!
//! The [`Dispatcher`] is the single consumer of the adapter's inbound stream.
//! For every message it spawns a task that:
//!
//! 1. Runs the rule matcher against the content
//! 2. Resolves the matched script and runs its action with a fresh
//!    [`ScriptContext`]
//! 3. Addresses each reply back to the sender and publishes it in the order
//!    the action produced them
//!
//! Unmatched messages are dropped silently.
//!
//! # Failure Isolation
//!
//! Actions run on their own task. An error, a panic or a timeout is captured
//! at that task's join point, logged with the offending content, and turned
//! into an empty reply set. Nothing propagates to the consumer loop or to
//! other messages.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start()──▶ Running ──stop() / inbound closed──▶ Stopped
//! ```
//!
//! `start` can be called exactly once. After `stop`, no further inbound
//! messages are read; tasks already in flight run to completion.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::foundation::{
    Contacts, DispatchError, DispatchResult, Message, ScriptError, ScriptResult,
};
use crate::memorizer::BoxedMemorizer;
use crate::script::{BoxFuture, MatchResult, ScriptContext, ScriptRegistry};

// =============================================================================
// Configuration & State
// =============================================================================

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of messages handled concurrently.
    ///
    /// The consumer loop waits for a free slot before reading the next
    /// message.
    pub max_in_flight: usize,
    /// Upper bound on a single action's run time.
    pub script_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            script_timeout: None,
        }
    }
}

/// Lifecycle state of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, not consuming yet.
    Created,
    /// The consumer loop is running.
    Running,
    /// The loop has ended; the dispatcher cannot be restarted.
    Stopped,
}

/// Counters collected by the consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages read from the inbound stream.
    pub received: u64,
    /// Messages that matched a script.
    pub matched: u64,
    /// Messages that matched nothing.
    pub unmatched: u64,
    /// Replies published to the outbound stream.
    pub replied: u64,
    /// Messages whose script failed, panicked or timed out.
    pub failed: u64,
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} received, {} matched, {} unmatched, {} replies, {} failed",
            self.received, self.matched, self.unmatched, self.replied, self.failed
        )
    }
}

/// What happened to one message.
enum TaskOutcome {
    Unmatched,
    Completed { replies: u64 },
    Failed,
}

impl DispatchStats {
    fn record(&mut self, joined: Result<TaskOutcome, JoinError>) {
        match joined {
            Ok(TaskOutcome::Unmatched) => self.unmatched += 1,
            Ok(TaskOutcome::Completed { replies }) => {
                self.matched += 1;
                self.replied += replies;
            }
            Ok(TaskOutcome::Failed) => {
                self.matched += 1;
                self.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "Message task aborted");
                self.failed += 1;
            }
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// The consumer loop connecting the inbound stream to scripts.
pub struct Dispatcher {
    registry: Arc<ScriptRegistry>,
    memorizer: BoxedMemorizer,
    contacts: Contacts,
    config: DispatcherConfig,
    state: Arc<Mutex<DispatcherState>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    ///
    /// The registry is moved behind an `Arc` and cannot be mutated anymore.
    pub fn new(registry: ScriptRegistry, memorizer: BoxedMemorizer) -> Self {
        Self {
            registry: Arc::new(registry),
            memorizer,
            contacts: Contacts::new(),
            config: DispatcherConfig::default(),
            state: Arc::new(Mutex::new(DispatcherState::Created)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Sets the configuration (builder pattern).
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares the adapter's roster with scripts (builder pattern).
    pub fn with_contacts(mut self, contacts: Contacts) -> Self {
        self.contacts = contacts;
        self
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<ScriptRegistry> {
        &self.registry
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        *self.state.lock()
    }

    /// Starts consuming `incoming`, publishing replies onto `outgoing`.
    ///
    /// The returned handle resolves with the loop's statistics once the
    /// inbound stream closes or [`stop`](Self::stop) is called, and every
    /// in-flight task has finished.
    pub fn start(
        &self,
        incoming: mpsc::Receiver<Message>,
        outgoing: mpsc::Sender<Message>,
    ) -> DispatchResult<JoinHandle<DispatchStats>> {
        {
            let mut state = self.state.lock();
            match *state {
                DispatcherState::Created => *state = DispatcherState::Running,
                DispatcherState::Running => return Err(DispatchError::AlreadyStarted),
                DispatcherState::Stopped => return Err(DispatchError::AlreadyStopped),
            }
        }

        let worker = Worker {
            registry: self.registry.clone(),
            memorizer: self.memorizer.clone(),
            contacts: self.contacts.clone(),
            outgoing,
            script_timeout: self.config.script_timeout,
        };
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();

        info!(
            scripts = self.registry.len(),
            max_in_flight = self.config.max_in_flight,
            "Dispatcher started"
        );

        Ok(tokio::spawn(async move {
            let stats = consume(incoming, worker, permits, shutdown).await;
            *state.lock() = DispatcherState::Stopped;
            info!(%stats, "Dispatcher stopped");
            stats
        }))
    }

    /// Stops reading inbound messages.
    ///
    /// In-flight tasks keep running; await the handle returned by
    /// [`start`](Self::start) to wait for them.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == DispatcherState::Created {
                *state = DispatcherState::Stopped;
            }
        }
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Consumer Loop
// =============================================================================

async fn consume(
    mut incoming: mpsc::Receiver<Message>,
    worker: Worker,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
) -> DispatchStats {
    let mut tasks = JoinSet::new();
    let mut stats = DispatchStats::default();

    loop {
        while let Some(joined) = tasks.try_join_next() {
            stats.record(joined);
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            message = incoming.recv() => match message {
                Some(message) => message,
                None => {
                    debug!("Inbound stream closed");
                    break;
                }
            },
        };

        stats.received += 1;
        tasks.spawn(worker.clone().handle(message, permit));
    }

    incoming.close();

    if !tasks.is_empty() {
        debug!(in_flight = tasks.len(), "Waiting for in-flight messages");
    }
    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }

    stats
}

/// Per-message task state.
#[derive(Clone)]
struct Worker {
    registry: Arc<ScriptRegistry>,
    memorizer: BoxedMemorizer,
    contacts: Contacts,
    outgoing: mpsc::Sender<Message>,
    script_timeout: Option<Duration>,
}

impl Worker {
    async fn handle(self, message: Message, _permit: OwnedSemaphorePermit) -> TaskOutcome {
        let Some(matched) = self.registry.match_script(&message.content) else {
            trace!(content = %message.content, "No script matched");
            return TaskOutcome::Unmatched;
        };

        let span = info_span!("script", script = %matched.script, rule = %matched.rule);
        self.run(message, matched).instrument(span).await
    }

    async fn run(self, message: Message, matched: MatchResult) -> TaskOutcome {
        let action = match self.registry.resolve(&matched.script) {
            Ok(script) => {
                let ctx = ScriptContext::new(
                    message.clone(),
                    matched,
                    self.memorizer.clone(),
                    self.outgoing.clone(),
                )
                .with_contacts(self.contacts.clone());
                script.call(ctx)
            }
            Err(e) => {
                error!(error = %e, "Matched script could not be resolved");
                return TaskOutcome::Failed;
            }
        };

        let replies = match isolate(action, self.script_timeout).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(content = %message.content, error = %e, "Script execution failed");
                return TaskOutcome::Failed;
            }
        };

        let mut sent = 0;
        for reply in replies {
            if self.outgoing.send(reply.reply_to(&message)).await.is_err() {
                warn!("Outbound stream closed, dropping remaining replies");
                break;
            }
            sent += 1;
        }
        debug!(replies = sent, "Script completed");
        TaskOutcome::Completed { replies: sent }
    }
}

/// Runs an action on its own task so panics and timeouts stay contained.
async fn isolate(
    action: BoxFuture<'static, ScriptResult<Vec<Message>>>,
    timeout: Option<Duration>,
) -> ScriptResult<Vec<Message>> {
    let mut handle = tokio::spawn(action);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(ScriptError::Timeout(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ScriptError::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(ScriptError::failed(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::foundation::User;
    use crate::memorizer::MemoryMemorizer;
    use crate::script::Script;

    async fn pong(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
        Ok(vec![Message::new("pong")])
    }

    async fn fail(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
        Err(ScriptError::failed("boom"))
    }

    async fn explode(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
        panic!("script exploded");
    }

    async fn slow(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![Message::new("too late")])
    }

    fn alice() -> User {
        User::new("a", "alice")
    }

    fn bot() -> User {
        User::new("b", "rboot")
    }

    fn inbound(content: &str) -> Message {
        Message::new(content).with_from(alice()).with_to(bot())
    }

    fn dispatcher(registry: ScriptRegistry) -> Dispatcher {
        Dispatcher::new(registry, Arc::new(MemoryMemorizer::new()))
    }

    fn ping_registry() -> ScriptRegistry {
        ScriptRegistry::new()
            .with(Script::new("ping", pong).rule("ping", "^ping$"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_reply_is_addressed_back() {
        let dispatcher = dispatcher(ping_registry());
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        in_tx.send(inbound("ping")).await.unwrap();
        let reply = out_rx.recv().await.unwrap();

        assert_eq!(reply.content, "pong");
        assert_eq!(reply.from, bot());
        assert_eq!(reply.to, alice());

        drop(in_tx);
        let stats = handle.await.unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.replied, 1);
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    }

    #[tokio::test]
    async fn test_unmatched_message_produces_nothing() {
        let dispatcher = dispatcher(ping_registry());
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        in_tx.send(inbound("hello")).await.unwrap();
        drop(in_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.matched, 0);
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let registry = ScriptRegistry::new()
            .with(Script::new("ping", pong).rule("ping", "^ping$"))
            .unwrap()
            .with(Script::new("fail", fail).rule("fail", "^fail$"))
            .unwrap()
            .with(Script::new("explode", explode).rule("explode", "^explode$"))
            .unwrap();
        let dispatcher = dispatcher(registry);
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        for content in ["fail", "ping", "explode", "ping"] {
            in_tx.send(inbound(content)).await.unwrap();
        }
        drop(in_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.replied, 2);

        let mut replies = Vec::new();
        while let Ok(reply) = out_rx.try_recv() {
            replies.push(reply.content);
        }
        assert_eq!(replies, ["pong", "pong"]);
    }

    #[tokio::test]
    async fn test_script_timeout() {
        let registry = ScriptRegistry::new()
            .with(Script::new("slow", slow).rule("slow", "slow"))
            .unwrap();
        let dispatcher = dispatcher(registry).with_config(DispatcherConfig {
            script_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        in_tx.send(inbound("slow")).await.unwrap();
        drop(in_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_is_guarded_by_state() {
        let dispatcher = dispatcher(ping_registry());
        assert_eq!(dispatcher.state(), DispatcherState::Created);

        let (_in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, _out_rx) = mpsc::channel(1);
        let handle = dispatcher.start(in_rx, out_tx.clone()).unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Running);

        let (_in_tx2, in_rx2) = mpsc::channel(1);
        assert!(matches!(
            dispatcher.start(in_rx2, out_tx.clone()),
            Err(DispatchError::AlreadyStarted)
        ));

        dispatcher.stop();
        handle.await.unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Stopped);

        let (_in_tx3, in_rx3) = mpsc::channel(1);
        assert!(matches!(
            dispatcher.start(in_rx3, out_tx),
            Err(DispatchError::AlreadyStopped)
        ));
    }

    #[tokio::test]
    async fn test_stop_lets_in_flight_tasks_finish() {
        let (started_tx, mut started_rx) = mpsc::channel::<()>(1);
        let script = Script::new("work", move |_ctx: ScriptContext| {
            let started = started_tx.clone();
            async move {
                let _ = started.send(()).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, ScriptError>(vec![Message::new("done")])
            }
        })
        .rule("work", "^work$");
        let dispatcher = dispatcher(ScriptRegistry::new().with(script).unwrap());
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        in_tx.send(inbound("work")).await.unwrap();
        started_rx.recv().await.unwrap();
        dispatcher.stop();

        let stats = handle.await.unwrap();
        assert_eq!(stats.replied, 1);
        assert_eq!(out_rx.recv().await.unwrap().content, "done");

        // Inbound is no longer accepted.
        assert!(in_tx.send(inbound("work")).await.is_err());
    }

    #[tokio::test]
    async fn test_context_send_precedes_returned_replies() {
        let script = Script::new("long", |ctx: ScriptContext| async move {
            ctx.send(Message::new("working...")).await?;
            Ok::<_, ScriptError>(vec![Message::new("finished")])
        })
        .rule("long", "^long$");
        let dispatcher = dispatcher(ScriptRegistry::new().with(script).unwrap());
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        in_tx.send(inbound("long")).await.unwrap();
        drop(in_tx);
        handle.await.unwrap();

        let first = out_rx.recv().await.unwrap();
        let second = out_rx.recv().await.unwrap();
        assert_eq!(first.content, "working...");
        assert_eq!(first.to, alice());
        assert_eq!(second.content, "finished");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_bound() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (c, p) = (current.clone(), peak.clone());
        let script = Script::new("busy", move |_ctx: ScriptContext| {
            let (current, peak) = (c.clone(), p.clone());
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ScriptError>(Vec::<Message>::new())
            }
        })
        .rule("busy", "busy");
        let dispatcher = dispatcher(ScriptRegistry::new().with(script).unwrap()).with_config(
            DispatcherConfig {
                max_in_flight: 2,
                ..Default::default()
            },
        );
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, _out_rx) = mpsc::channel(16);
        let handle = dispatcher.start(in_rx, out_tx).unwrap();

        for _ in 0..10 {
            in_tx.send(inbound("busy")).await.unwrap();
        }
        drop(in_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.matched, 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
