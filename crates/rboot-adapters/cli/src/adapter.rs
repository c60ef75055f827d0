//! Terminal adapter.
//!
//! Every non-blank line read from the terminal becomes an inbound message from
//! the configured user to the bot. Replies are written one per line. Reaching
//! end of input closes the inbound stream, which ends the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rboot_core::{
    Adapter, AdapterError, AdapterInit, AdapterPipes, AdapterResult, ConfigurableAdapter,
    Contacts, Message, User,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::CliConfig;

type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reads messages from a line-oriented input and writes replies to an output.
pub struct CliAdapter {
    user: User,
    bot: User,
    contacts: Contacts,
    pipes: AdapterPipes,
    io: Mutex<Option<(BoxedReader, BoxedWriter)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl CliAdapter {
    /// Creates an adapter over the process's stdin and stdout.
    pub fn new(config: CliConfig, init: AdapterInit) -> Arc<Self> {
        Self::with_io(
            config,
            init,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// Creates an adapter over arbitrary input and output streams.
    pub fn with_io<R, W>(config: CliConfig, init: AdapterInit, reader: R, writer: W) -> Arc<Self>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            user: User::with_id(config.user),
            bot: init.bot,
            contacts: init.contacts,
            pipes: AdapterPipes::new(Self::NAME, init.channel_capacity),
            io: Mutex::new(Some((Box::new(reader), Box::new(writer)))),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns the identity attached to inbound messages.
    pub fn user(&self) -> &User {
        &self.user
    }
}

#[async_trait]
impl Adapter for CliAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn on_start(&self) -> AdapterResult<()> {
        let (reader, writer) = self
            .io
            .lock()
            .take()
            .ok_or_else(|| AdapterError::internal("CLI adapter already started"))?;
        let (inbound, outbound) = self.pipes.take_transport()?;
        // The terminal user is the only person on this transport.
        self.contacts.sync(vec![self.user.clone()]);

        let reader_task = tokio::spawn(read_lines(
            reader,
            inbound,
            self.user.clone(),
            self.bot.clone(),
            self.shutdown.clone(),
        ));
        let writer_task = tokio::spawn(write_replies(writer, outbound, self.shutdown.clone()));
        self.tasks.lock().extend([reader_task, writer_task]);

        info!(user = %self.user.id, "CLI adapter listening");
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
                .map_err(|e| AdapterError::internal(format!("CLI task failed: {e}")))?;
        }
        debug!("CLI adapter stopped");
        Ok(())
    }
}

impl ConfigurableAdapter for CliAdapter {
    const NAME: &'static str = "cli";
    type Config = CliConfig;

    fn from_config(config: CliConfig, init: AdapterInit) -> AdapterResult<Arc<Self>> {
        Ok(Self::new(config, init))
    }
}

impl std::fmt::Debug for CliAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliAdapter")
            .field("user", &self.user)
            .field("bot", &self.bot)
            .field("pipes", &self.pipes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Transport Tasks
// =============================================================================

/// Forwards input lines until end of input, shutdown or the dispatcher going
/// away. Dropping `inbound` on exit closes the inbound stream.
async fn read_lines(
    reader: BoxedReader,
    inbound: mpsc::Sender<Message>,
    user: User,
    bot: User,
    shutdown: CancellationToken,
) {
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let content = line.trim();
                if content.is_empty() {
                    continue;
                }
                trace!(content, "CLI input");
                let message = Message::text(user.clone(), bot.clone(), content);
                if inbound.send(message).await.is_err() {
                    debug!("Inbound stream closed, CLI reader exiting");
                    break;
                }
            }
            Ok(None) => {
                info!("End of CLI input");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read CLI input");
                break;
            }
        }
    }
}

/// Writes replies until shutdown, then flushes whatever is still queued.
async fn write_replies(
    mut writer: BoxedWriter,
    mut outbound: mpsc::Receiver<Message>,
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
                    if write_line(&mut writer, message).await.is_err() {
                        break;
                    }
                }
                break;
            }
        };

        if write_line(&mut writer, message).await.is_err() {
            break;
        }
    }
}

async fn write_line(writer: &mut BoxedWriter, message: Message) -> std::io::Result<()> {
    let mut line = message.content;
    line.push('\n');

    let mut result = writer.write_all(line.as_bytes()).await;
    if result.is_ok() {
        result = writer.flush().await;
    }

    if let Err(e) = &result {
        warn!(error = %e, "Failed to write CLI output");
    }
    result
}
