//! Concurrent batch delivery.
//!
//! [`SendEngine::send`] fans the batch out to one task per message and
//! streams a snapshot of every status transition over a bounded channel:
//!
//! ```text
//! NotSent ──→ Queued ──→ Sending ──┬──→ Sent
//!                                  └──→ SendError
//! ```
//!
//! Snapshots of one message always arrive in that order. Snapshots of
//! different messages interleave freely.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use cloudpost_mime::{Message, MessageStatus};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::error::{Error, Result};
use crate::provider::{AuthConfig, Provider};
use crate::tracker::StatusTracker;
use crate::transport::{Route, SmtpTransport, TransportAdapter};

/// Default capacity of the status channel.
///
/// Workers block once the channel is full, so callers must keep draining
/// the receiver while a batch is in flight.
pub const STATUS_CHANNEL_CAPACITY: usize = 10;

/// Delivers a batch of messages through a [`TransportAdapter`].
pub struct SendEngine<T> {
    transport: Arc<T>,
    batch: Arc<RwLock<Vec<Message>>>,
    tracker: Arc<StatusTracker>,
    channel_capacity: usize,
}

impl<T> Clone for SendEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            batch: Arc::clone(&self.batch),
            tracker: Arc::clone(&self.tracker),
            channel_capacity: self.channel_capacity,
        }
    }
}

impl<T: TransportAdapter> SendEngine<T> {
    /// Creates an engine with an empty batch.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_channel_capacity(transport, STATUS_CHANNEL_CAPACITY)
    }

    /// Creates an engine whose status channel holds `capacity` snapshots
    /// (at least one).
    #[must_use]
    pub fn with_channel_capacity(transport: T, capacity: usize) -> Self {
        Self {
            transport: Arc::new(transport),
            batch: Arc::new(RwLock::new(Vec::new())),
            tracker: Arc::new(StatusTracker::new()),
            channel_capacity: capacity.max(1),
        }
    }

    /// The transport messages are submitted through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Appends a message to the batch.
    pub fn add_message(&self, message: Message) {
        let mut batch = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        self.tracker.register(message.status());
        batch.push(message);
    }

    /// Appends several messages to the batch under one lock.
    pub fn add_messages(&self, messages: impl IntoIterator<Item = Message>) {
        let mut batch = self.batch.write().unwrap_or_else(PoisonError::into_inner);
        for message in messages {
            self.tracker.register(message.status());
            batch.push(message);
        }
    }

    /// Number of messages in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.batch).len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.batch).is_empty()
    }

    /// Copy of the batch as it was added.
    ///
    /// Dispatch never modifies these messages; live progress is available
    /// from [`tracker`](Self::tracker) and the status channel.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        read(&self.batch).clone()
    }

    /// Latest status of every batch slot.
    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Starts delivering every message currently in the batch.
    ///
    /// The returned receiver gets a snapshot of each message on every status
    /// transition and closes once every worker has finished. Failures are
    /// reported on the snapshots (`SendError` with [`Message::error`]), not
    /// through this result.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error, before any message is queued, if the transport
    /// cannot be set up.
    pub fn send(&self) -> Result<mpsc::Receiver<Message>> {
        let route = self.transport.resolve()?;
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let dispatcher = Dispatcher {
            transport: Arc::clone(&self.transport),
            batch: Arc::clone(&self.batch),
            tracker: Arc::clone(&self.tracker),
            route,
        };
        tokio::spawn(dispatcher.run(tx).instrument(info_span!("dispatch")));

        Ok(rx)
    }

    /// Fraction of the batch that has been sent.
    ///
    /// Read from the [`StatusTracker`], which every worker updates before
    /// publishing a snapshot, so it may be called while a dispatch is in
    /// flight. An empty batch yields `NaN`; check
    /// [`is_empty`](Self::is_empty) first when that matters.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be set up.
    pub fn send_status(&self) -> Result<f64> {
        self.transport.resolve()?;
        Ok(self.tracker.ratio())
    }

    /// Aborting in-flight deliveries is not supported.
    ///
    /// # Errors
    ///
    /// Returns the transport setup error if there is one, otherwise
    /// [`Error::Unsupported`].
    pub fn cancel_send(&self) -> Result<bool> {
        self.transport.resolve()?;
        Err(Error::Unsupported("cancelling in-flight sends"))
    }
}

/// Authenticates `config` and builds an engine delivering through its SMTP
/// settings.
///
/// # Errors
///
/// Returns the provider's authentication error.
pub fn engine_for(config: AuthConfig) -> Result<SendEngine<SmtpTransport<AuthConfig>>> {
    config.authenticate()?;
    info!(provider = config.name(), "creating send engine");
    Ok(SendEngine::new(SmtpTransport::new(config)))
}

struct Dispatcher<T> {
    transport: Arc<T>,
    batch: Arc<RwLock<Vec<Message>>>,
    tracker: Arc<StatusTracker>,
    route: Arc<Route>,
}

impl<T: TransportAdapter> Dispatcher<T> {
    async fn run(self, tx: mpsc::Sender<Message>) {
        let total = read(&self.batch).len();
        info!(total, endpoint = %self.route.endpoint, "dispatching batch");

        let mut workers = JoinSet::new();
        for index in 0..total {
            let Some(mut message) = read(&self.batch).get(index).cloned() else {
                break;
            };
            transition(&self.tracker, index, &mut message, MessageStatus::Queued);
            publish(&tx, message.clone()).await;

            let span = info_span!("deliver", index, id = %message.id);
            let worker = Worker {
                transport: Arc::clone(&self.transport),
                route: Arc::clone(&self.route),
                tracker: Arc::clone(&self.tracker),
                tx: tx.clone(),
                index,
            };
            workers.spawn(worker.deliver(message).instrument(span));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "delivery worker did not finish");
            }
        }
        drop(tx);

        let counts = self.tracker.counts();
        info!(
            sent = counts.sent,
            failed = counts.failed,
            "batch dispatch finished"
        );
    }
}

struct Worker<T> {
    transport: Arc<T>,
    route: Arc<Route>,
    tracker: Arc<StatusTracker>,
    tx: mpsc::Sender<Message>,
    index: usize,
}

impl<T: TransportAdapter> Worker<T> {
    async fn deliver(self, mut message: Message) {
        transition(&self.tracker, self.index, &mut message, MessageStatus::Sending);
        publish(&self.tx, message.clone()).await;

        match self.submit(&message).await {
            Ok(()) => transition(&self.tracker, self.index, &mut message, MessageStatus::Sent),
            Err(err) => {
                warn!(error = %err, "delivery failed");
                message.fail(err.to_failure());
                self.tracker.record(self.index, MessageStatus::SendError);
                debug!(
                    index = self.index,
                    id = %message.id,
                    status = %MessageStatus::SendError,
                    "status changed"
                );
            }
        }

        publish(&self.tx, message).await;
    }

    async fn submit(&self, message: &Message) -> Result<()> {
        let recipients = message.tolist()?;
        let data = message.to_bytes()?;
        self.transport
            .submit(&self.route, &message.from.address, &recipients, &data)
            .await
    }
}

fn transition(tracker: &StatusTracker, index: usize, message: &mut Message, status: MessageStatus) {
    message.set_status(status);
    tracker.record(index, status);
    debug!(index, id = %message.id, %status, "status changed");
}

async fn publish(tx: &mpsc::Sender<Message>, message: Message) {
    if tx.send(message).await.is_err() {
        trace!("status receiver dropped; snapshot discarded");
    }
}

fn read(batch: &RwLock<Vec<Message>>) -> RwLockReadGuard<'_, Vec<Message>> {
    batch.read().unwrap_or_else(PoisonError::into_inner)
}
