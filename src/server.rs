//! Server builder and lifecycle.
//!
//! The [`ServerBuilder`] collects handler declarations and, on
//! [`ServerBuilder::bind`], wires them to live queue consumers in three
//! passes:
//!
//! 1. Message handlers: register, create one consumer per queue.
//! 2. Event listeners: register, attach to the queue's existing consumer.
//! 3. Start every consumer.
//!
//! Starting happens last so no event can fire before its listener is
//! attached. The result is a [`DispatchServer`], whose only remaining job is
//! [`DispatchServer::shutdown`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::consumer::ChannelConsumerFactory;
//! use queuewire::dispatch::Reply;
//! use queuewire::server::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> queuewire::Result<()> {
//!     let factory = Arc::new(ChannelConsumerFactory::new());
//!
//!     let mut server = ServerBuilder::new(factory.clone())
//!         .handle_queue(MessageHandlerConfig::new("https://queue/Q1"), |ctx| async move {
//!             Ok(Reply::none())
//!         })
//!         .bind()?;
//!
//!     // ... deliver work through the factory's QueueHandle ...
//!
//!     server.shutdown();
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{EventHandlerConfig, MessageHandlerConfig};
use crate::consumer::{ConsumerFactory, EventCallback, MessageCallback, QueueConsumer};
use crate::dispatch::Dispatcher;
use crate::error::{QueuewireError, Result};
use crate::handler::{
    DispatchContext, HandlerDeclaration, HandlerRegistry, HandlerResult, TypedHandler,
};

/// Collects declarations and binds them into a running [`DispatchServer`].
pub struct ServerBuilder {
    declarations: Vec<HandlerDeclaration>,
    factory: Arc<dyn ConsumerFactory>,
}

impl ServerBuilder {
    /// Create a builder over the given consumer factory.
    pub fn new(factory: Arc<dyn ConsumerFactory>) -> Self {
        Self {
            declarations: Vec::new(),
            factory,
        }
    }

    /// Add a declaration as the host framework produced it.
    pub fn declare(mut self, declaration: HandlerDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Register a message handler for a queue.
    ///
    /// The handler receives the dispatch context; the raw input's envelope
    /// shape follows `config.batch`.
    pub fn handle_queue<F, Fut>(self, config: MessageHandlerConfig, handler: F) -> Self
    where
        F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.declare(HandlerDeclaration::message(config, handler))
    }

    /// Register a message handler that receives the message's JSON body
    /// parsed into `T`. Only valid on non-batch queues.
    pub fn handle_json<F, T, Fut>(self, config: MessageHandlerConfig, handler: F) -> Self
    where
        F: Fn(T, DispatchContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.declare(HandlerDeclaration::message(config, TypedHandler::new(handler)))
    }

    /// Register a listener for one lifecycle event on a queue.
    pub fn on_queue_event<F, Fut>(self, config: EventHandlerConfig, handler: F) -> Self
    where
        F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.declare(HandlerDeclaration::queue_event(config, handler))
    }

    /// Bind all declarations and start polling.
    ///
    /// # Errors
    ///
    /// Consumer construction failures from the factory. Registration
    /// conflicts and orphaned event listeners are not errors: they are
    /// logged and skipped, and the first registration wins.
    pub fn bind(self) -> Result<DispatchServer> {
        let mut registry = HandlerRegistry::new();
        let mut consumers: HashMap<String, Box<dyn QueueConsumer>> = HashMap::new();

        // Pass 1: message handlers. One consumer per distinct queue; the
        // first declaration for a queue wins, in declaration order.
        for declaration in &self.declarations {
            let Some(config) = declaration.extras.message.clone() else {
                continue;
            };
            if !registry.register_message_handler(&config, declaration.clone()) {
                continue;
            }

            tracing::info!(queue_url = %config.queue_url, "configuring handler for queue");
            let callback = message_callback(declaration.clone(), config.clone());
            let consumer = self.factory.create(&config, callback)?;
            consumers.insert(config.queue_url.clone(), consumer);
        }

        // Pass 2: event listeners attach to existing consumers only. The
        // consumer is checked first so a dropped orphan never reserves its
        // (queue, event) pair.
        for declaration in &self.declarations {
            let Some(config) = declaration.extras.queue_event.clone() else {
                continue;
            };

            let Some(consumer) = consumers.get_mut(&config.queue_url) else {
                tracing::warn!(
                    queue_url = %config.queue_url,
                    event = %config.event,
                    "attempting to bind event handler to non-existent queue, ignoring handler"
                );
                continue;
            };
            if !registry.register_event_listener(&config) {
                continue;
            }

            tracing::info!(
                queue_url = %config.queue_url,
                event = %config.event,
                "configuring event handler for queue"
            );
            consumer.subscribe(config.event, event_callback(declaration.clone(), config));
        }

        // Pass 3: start polling, now that every listener is attached.
        for consumer in consumers.values_mut() {
            consumer.start();
        }

        Ok(DispatchServer {
            registry,
            consumers,
            stopped: false,
        })
    }
}

/// Callback the consumer invokes per delivery; the envelope shape is fixed
/// by `config.batch` at bind time.
fn message_callback(
    declaration: HandlerDeclaration,
    config: MessageHandlerConfig,
) -> MessageCallback {
    Arc::new(move |envelope| {
        let declaration = declaration.clone();
        let config = config.clone();
        Box::pin(async move {
            Dispatcher::dispatch_message(&declaration, &config, envelope)
                .await
                .map(|_| ())
        })
    })
}

/// Listener the consumer fires per subscribed event. Listener failures have
/// no ack path, so they are logged rather than propagated.
fn event_callback(declaration: HandlerDeclaration, config: EventHandlerConfig) -> EventCallback {
    Arc::new(move |event| {
        let declaration = declaration.clone();
        let config = config.clone();
        Box::pin(async move {
            if let Err(err) = Dispatcher::dispatch_event(&declaration, &config, event).await {
                tracing::error!(
                    queue_url = %config.queue_url,
                    event = %config.event,
                    error = %err,
                    "queue event listener failed"
                );
            }
        })
    })
}

/// A bound set of running queue consumers.
///
/// Registration state is frozen at bind time; the server only exposes
/// read-only inspection and shutdown.
pub struct DispatchServer {
    registry: HandlerRegistry,
    consumers: HashMap<String, Box<dyn QueueConsumer>>,
    stopped: bool,
}

impl DispatchServer {
    /// Stop every consumer. Idempotent.
    ///
    /// In-flight dispatches are allowed to finish, but no new poll is
    /// issued. Does not wait for in-flight invocations to drain.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for (queue_url, consumer) in &mut self.consumers {
            if !self.registry.has_handler(queue_url) {
                tracing::warn!(
                    queue_url = %queue_url,
                    "stopping consumers: no handler found for queue"
                );
            }
            consumer.stop();
        }
    }

    /// True once [`DispatchServer::shutdown`] has run.
    pub fn is_shutdown(&self) -> bool {
        self.stopped
    }

    /// The frozen registration tables.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// True if a consumer exists for the queue.
    pub fn has_consumer(&self, queue_url: &str) -> bool {
        self.consumers.contains_key(queue_url)
    }

    /// Register an ad-hoc event listener outside the bind phase.
    ///
    /// Not supported: registration state is frozen after bind. Kept so
    /// callers get a clear signal instead of a silent no-op.
    pub fn subscribe(
        &mut self,
        _queue_url: &str,
        _kind: crate::event::QueueEventKind,
        _listener: EventCallback,
    ) -> Result<()> {
        Err(QueuewireError::Unsupported(
            "registering event listeners outside the bind phase",
        ))
    }

    /// Expose the raw underlying consumer for a queue.
    ///
    /// Not supported: the transport stays behind the [`QueueConsumer`]
    /// trait. Kept so callers get a clear signal instead of a silent no-op.
    pub fn raw_consumer(&self, _queue_url: &str) -> Result<&dyn QueueConsumer> {
        Err(QueuewireError::Unsupported(
            "exposing the raw underlying queue consumer",
        ))
    }
}
