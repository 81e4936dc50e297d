//! In-process channel-backed queue consumer.
//!
//! Each consumer is a dedicated task fed by an mpsc channel. The producer
//! side is a [`QueueHandle`]: `deliver` pushes messages and resolves to the
//! callback's outcome (the ack/nack seam), `fire` raises a lifecycle event.
//!
//! # Architecture
//!
//! ```text
//! QueueHandle ──► mpsc::Sender<Delivery> ──► consumer task ──► dispatcher
//!      ▲                                          │
//!      └────────── oneshot ack per delivery ──────┘
//! ```
//!
//! The task processes deliveries sequentially: a new delivery is not picked
//! up before the previous callback completes, matching the polling model of
//! a real queue consumer. Stopping lets the in-flight callback finish and
//! drops everything still queued (their `deliver` calls resolve to
//! [`QueuewireError::QueueStopped`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{ConsumerFactory, EventCallback, MessageCallback, QueueConsumer};
use crate::config::MessageHandlerConfig;
use crate::error::{QueuewireError, Result};
use crate::event::{QueueEvent, QueueEventKind, QueueEventPayload};
use crate::message::{Envelope, Message};

/// Default delivery channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// One unit of work pushed to a consumer.
enum Delivery {
    /// Messages to run through the callback. An empty vec models an empty
    /// poll and only raises the `empty` event.
    Messages {
        messages: Vec<Message>,
        ack: oneshot::Sender<Result<()>>,
    },
    /// A lifecycle event to raise.
    Event {
        payload: QueueEventPayload,
        ack: oneshot::Sender<Result<()>>,
    },
}

/// Producer handle for one queue's consumer.
#[derive(Clone)]
pub struct QueueHandle {
    queue_url: String,
    tx: mpsc::Sender<Delivery>,
}

impl QueueHandle {
    /// The queue this handle feeds.
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Deliver a poll's worth of messages and wait for the outcome.
    ///
    /// Resolves to whatever the message callback returned — a handler error
    /// surfaces here, exactly as a real consumer would observe it.
    ///
    /// # Errors
    ///
    /// The callback's error, or [`QueuewireError::QueueStopped`] if the
    /// consumer is gone.
    pub async fn deliver(&self, messages: Vec<Message>) -> Result<()> {
        let (ack, outcome) = oneshot::channel();
        self.tx
            .send(Delivery::Messages { messages, ack })
            .await
            .map_err(|_| QueuewireError::QueueStopped)?;
        outcome.await.map_err(|_| QueuewireError::QueueStopped)?
    }

    /// Deliver a single message.
    pub async fn deliver_one(&self, message: Message) -> Result<()> {
        self.deliver(vec![message]).await
    }

    /// Raise a lifecycle event and wait for its listener to complete.
    pub async fn fire(&self, payload: QueueEventPayload) -> Result<()> {
        let (ack, outcome) = oneshot::channel();
        self.tx
            .send(Delivery::Event { payload, ack })
            .await
            .map_err(|_| QueuewireError::QueueStopped)?;
        outcome.await.map_err(|_| QueuewireError::QueueStopped)?
    }
}

/// Factory producing [`ChannelConsumer`]s and retaining a [`QueueHandle`]
/// per queue for the producer side.
pub struct ChannelConsumerFactory {
    capacity: usize,
    handles: Mutex<HashMap<String, QueueHandle>>,
}

impl ChannelConsumerFactory {
    /// Create a factory with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a factory with the given per-queue channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The producer handle for a queue, once its consumer exists.
    pub fn handle(&self, queue_url: &str) -> Option<QueueHandle> {
        self.handles.lock().expect("handles lock").get(queue_url).cloned()
    }
}

impl Default for ChannelConsumerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerFactory for ChannelConsumerFactory {
    fn create(
        &self,
        config: &MessageHandlerConfig,
        callback: MessageCallback,
    ) -> Result<Box<dyn QueueConsumer>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.handles.lock().expect("handles lock").insert(
            config.queue_url.clone(),
            QueueHandle {
                queue_url: config.queue_url.clone(),
                tx,
            },
        );

        Ok(Box::new(ChannelConsumer::new(config, callback, rx)))
    }
}

/// Channel-fed consumer for one queue.
pub struct ChannelConsumer {
    queue_url: String,
    batch: bool,
    callback: MessageCallback,
    listeners: HashMap<QueueEventKind, EventCallback>,
    rx: Option<mpsc::Receiver<Delivery>>,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ChannelConsumer {
    fn new(
        config: &MessageHandlerConfig,
        callback: MessageCallback,
        rx: mpsc::Receiver<Delivery>,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            queue_url: config.queue_url.clone(),
            batch: config.batch,
            callback,
            listeners: HashMap::new(),
            rx: Some(rx),
            stop,
            task: None,
        }
    }
}

impl QueueConsumer for ChannelConsumer {
    fn subscribe(&mut self, kind: QueueEventKind, listener: EventCallback) {
        if self.rx.is_none() {
            tracing::warn!(
                queue_url = %self.queue_url,
                event = %kind,
                "listener subscribed after start, ignoring"
            );
            return;
        }
        if self.listeners.contains_key(&kind) {
            tracing::warn!(
                queue_url = %self.queue_url,
                event = %kind,
                "listener already attached for event, keeping the first"
            );
            return;
        }
        self.listeners.insert(kind, listener);
    }

    fn start(&mut self) {
        let Some(rx) = self.rx.take() else {
            tracing::debug!(queue_url = %self.queue_url, "consumer already started");
            return;
        };

        let loop_ = PollLoop {
            queue_url: self.queue_url.clone(),
            batch: self.batch,
            callback: Arc::clone(&self.callback),
            listeners: Arc::new(self.listeners.clone()),
        };
        let stop = self.stop.subscribe();
        self.task = Some(tokio::spawn(loop_.run(rx, stop)));
    }

    fn stop(&mut self) {
        let _ = self.stop.send(true);
    }

    fn is_running(&self) -> bool {
        !*self.stop.borrow()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// State moved into the consumer task.
struct PollLoop {
    queue_url: String,
    batch: bool,
    callback: MessageCallback,
    listeners: Arc<HashMap<QueueEventKind, EventCallback>>,
}

impl PollLoop {
    async fn run(self, mut rx: mpsc::Receiver<Delivery>, mut stop: watch::Receiver<bool>) {
        self.emit(QueueEventPayload::Started).await;

        loop {
            tokio::select! {
                // Checked first so a stop signal beats queued deliveries.
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                delivery = rx.recv() => {
                    match delivery {
                        None => break,
                        Some(Delivery::Messages { messages, ack }) => {
                            let outcome = self.process(messages).await;
                            let _ = ack.send(outcome);
                        }
                        Some(Delivery::Event { payload, ack }) => {
                            self.emit(payload).await;
                            let _ = ack.send(Ok(()));
                        }
                    }
                }
            }
        }

        self.emit(QueueEventPayload::Stopped).await;
        tracing::debug!(queue_url = %self.queue_url, "consumer stopped");
    }

    /// Run one delivery through the message callback, raising the matching
    /// lifecycle events around it.
    async fn process(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            self.emit(QueueEventPayload::Empty).await;
            return Ok(());
        }

        if self.batch {
            for message in &messages {
                self.emit(QueueEventPayload::MessageReceived {
                    message: message.clone(),
                })
                .await;
            }

            match (self.callback)(Envelope::Batch(messages.clone())).await {
                Ok(()) => {
                    for message in messages {
                        self.emit(QueueEventPayload::MessageProcessed { message }).await;
                    }
                    Ok(())
                }
                Err(err) => {
                    // Batch failures have no single offending message.
                    self.emit(QueueEventPayload::Error {
                        error: err.to_string(),
                        message: None,
                    })
                    .await;
                    Err(err)
                }
            }
        } else {
            for message in messages {
                self.emit(QueueEventPayload::MessageReceived {
                    message: message.clone(),
                })
                .await;

                match (self.callback)(Envelope::Single(message.clone())).await {
                    Ok(()) => {
                        self.emit(QueueEventPayload::MessageProcessed { message }).await;
                    }
                    Err(err) => {
                        self.emit(QueueEventPayload::ProcessingError {
                            error: err.to_string(),
                            message,
                        })
                        .await;
                        // Remaining messages in the delivery are not
                        // attempted; redelivery is the producer's call.
                        return Err(err);
                    }
                }
            }
            Ok(())
        }
    }

    async fn emit(&self, payload: QueueEventPayload) {
        let kind = payload.kind();
        if let Some(listener) = self.listeners.get(&kind) {
            listener(QueueEvent::new(self.queue_url.clone(), payload)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_callback() -> (MessageCallback, Arc<Mutex<Vec<Envelope>>>) {
        let seen: Arc<Mutex<Vec<Envelope>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: MessageCallback = Arc::new(move |envelope| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().expect("sink lock").push(envelope);
                Ok(())
            })
        });
        (callback, seen)
    }

    fn consumer_for(
        config: &MessageHandlerConfig,
        factory: &ChannelConsumerFactory,
        callback: MessageCallback,
    ) -> (Box<dyn QueueConsumer>, QueueHandle) {
        let consumer = factory.create(config, callback).unwrap();
        let handle = factory.handle(&config.queue_url).unwrap();
        (consumer, handle)
    }

    #[tokio::test]
    async fn test_single_mode_delivers_single_envelopes() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        handle
            .deliver(vec![Message::new("m1", "a"), Message::new("m2", "b")])
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|e| !e.is_batch()));
        assert_eq!(seen[0].first().unwrap().id, "m1");
        assert_eq!(seen[1].first().unwrap().id, "m2");
    }

    #[tokio::test]
    async fn test_batch_mode_delivers_one_batch_envelope() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1").batch(true);
        let (callback, seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        handle
            .deliver(vec![Message::new("m1", "a"), Message::new("m2", "b")])
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_batch());
        assert_eq!(seen[0].len(), 2);
    }

    #[tokio::test]
    async fn test_callback_error_surfaces_at_deliver() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let callback: MessageCallback = Arc::new(|_envelope| {
            Box::pin(async { Err(QueuewireError::handler_msg("boom")) })
        });
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        let err = handle.deliver_one(Message::new("m1", "a")).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_empty_delivery_raises_empty_event() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        let empties = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&empties);
        consumer.subscribe(
            QueueEventKind::Empty,
            Arc::new(move |_event| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );

        consumer.start();
        handle.deliver(Vec::new()).await.unwrap();

        assert_eq!(empties.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processing_events_fire_around_callback() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, _seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        let kinds: Arc<Mutex<Vec<QueueEventKind>>> = Arc::new(Mutex::new(Vec::new()));
        for kind in [QueueEventKind::MessageReceived, QueueEventKind::MessageProcessed] {
            let sink = Arc::clone(&kinds);
            consumer.subscribe(
                kind,
                Arc::new(move |event| {
                    let sink = Arc::clone(&sink);
                    Box::pin(async move {
                        sink.lock().expect("kinds lock").push(event.kind());
                    })
                }),
            );
        }

        consumer.start();
        handle.deliver_one(Message::new("m1", "a")).await.unwrap();

        assert_eq!(
            *kinds.lock().unwrap(),
            vec![QueueEventKind::MessageReceived, QueueEventKind::MessageProcessed]
        );
    }

    #[tokio::test]
    async fn test_fire_reaches_listener() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, _seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        consumer.subscribe(
            QueueEventKind::Error,
            Arc::new(move |event| {
                let sink = Arc::clone(&sink);
                Box::pin(async move {
                    if let QueueEventPayload::Error { error, .. } = event.payload {
                        sink.lock().expect("errors lock").push(error);
                    }
                })
            }),
        );

        consumer.start();
        handle
            .fire(QueueEventPayload::Error {
                error: "receive failed".to_string(),
                message: None,
            })
            .await
            .unwrap();

        assert_eq!(*errors.lock().unwrap(), vec!["receive failed".to_string()]);
    }

    #[tokio::test]
    async fn test_unsubscribed_event_is_ignored() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, _seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        // No listener attached: firing still acks cleanly.
        handle.fire(QueueEventPayload::Empty).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_rejects_new_deliveries() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, _seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        handle.deliver_one(Message::new("m1", "a")).await.unwrap();

        consumer.stop();
        // Give the task a chance to observe the stop signal.
        tokio::task::yield_now().await;

        let err = handle.deliver_one(Message::new("m2", "b")).await.unwrap_err();
        assert!(matches!(err, QueuewireError::QueueStopped));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();
        consumer.start();

        handle.deliver_one(Message::new("m1", "a")).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_late_subscribe_is_ignored() {
        let factory = ChannelConsumerFactory::new();
        let config = MessageHandlerConfig::new("q1");
        let (callback, _seen) = recording_callback();
        let (mut consumer, handle) = consumer_for(&config, &factory, callback);

        consumer.start();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        consumer.subscribe(
            QueueEventKind::Empty,
            Arc::new(move |_event| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );

        handle.deliver(Vec::new()).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
