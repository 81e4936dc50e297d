//! Handler declarations and the registration tables.
//!
//! The registry enforces the two uniqueness policies at the heart of the
//! dispatch layer: at most one message handler per queue, and at most one
//! listener per (queue, event) pair. Registration is first-wins — a losing
//! registration is logged and ignored, never an error.
//!
//! The registry is pure bookkeeping: it is populated once during the bind
//! phase and read-only afterwards. Consumer creation is the binder's job.
//!
//! # Example
//!
//! ```
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::dispatch::Reply;
//! use queuewire::handler::{DispatchContext, HandlerDeclaration, HandlerRegistry};
//!
//! let mut registry = HandlerRegistry::new();
//! let config = MessageHandlerConfig::new("https://queue/Q1");
//! let decl = HandlerDeclaration::message(config.clone(), |_ctx: DispatchContext| async {
//!     Ok(Reply::none())
//! });
//!
//! assert!(registry.register_message_handler(&config, decl.clone()));
//! assert!(!registry.register_message_handler(&config, decl));
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::DispatchContext;
use crate::config::{EventHandlerConfig, MessageHandlerConfig};
use crate::dispatch::Reply;
use crate::error::{QueuewireError, Result};
use crate::event::QueueEventKind;

/// Result type for handler functions.
pub type HandlerResult = Result<Reply>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
///
/// Implemented for any `Fn(DispatchContext) -> impl Future<Output =
/// HandlerResult>`, so plain async closures register directly.
pub trait Handler: Send + Sync + 'static {
    /// Handle one dispatch.
    fn call(&self, ctx: DispatchContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: DispatchContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(ctx))
    }
}

/// Wrapper that parses a single message's JSON body before calling the
/// handler.
///
/// Only valid on non-batch queues: the dispatch must carry exactly one
/// message.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, DispatchContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, DispatchContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, DispatchContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: DispatchContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match super::extract::json_body(&ctx) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(parsed, ctx);
        Box::pin(fut)
    }
}

/// What a declaration binds to: message config, event config, or both.
#[derive(Debug, Clone, Default)]
pub struct HandlerExtras {
    /// Present when the declaration is a message handler.
    pub message: Option<MessageHandlerConfig>,
    /// Present when the declaration is an event listener.
    pub queue_event: Option<EventHandlerConfig>,
}

/// A declared handler as the host framework hands it to the binder.
#[derive(Clone)]
pub struct HandlerDeclaration {
    /// Opaque unique identifier for the declaration.
    pub identifier: String,
    /// The handler itself.
    pub handler: Arc<dyn Handler>,
    /// Attached configuration.
    pub extras: HandlerExtras,
}

impl HandlerDeclaration {
    /// Declare a message handler for the given queue config.
    pub fn message(config: MessageHandlerConfig, handler: impl Handler) -> Self {
        Self {
            identifier: uuid::Uuid::new_v4().to_string(),
            handler: Arc::new(handler),
            extras: HandlerExtras {
                message: Some(config),
                queue_event: None,
            },
        }
    }

    /// Declare a lifecycle event listener for the given event config.
    pub fn queue_event(config: EventHandlerConfig, handler: impl Handler) -> Self {
        Self {
            identifier: uuid::Uuid::new_v4().to_string(),
            handler: Arc::new(handler),
            extras: HandlerExtras {
                message: None,
                queue_event: Some(config),
            },
        }
    }

    /// Attach a message config to an existing declaration.
    pub fn with_message_config(mut self, config: MessageHandlerConfig) -> Self {
        self.extras.message = Some(config);
        self
    }

    /// Attach an event config to an existing declaration.
    pub fn with_event_config(mut self, config: EventHandlerConfig) -> Self {
        self.extras.queue_event = Some(config);
        self
    }
}

impl std::fmt::Debug for HandlerDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDeclaration")
            .field("identifier", &self.identifier)
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

/// Registration tables: one message handler per queue, one listener per
/// (queue, event) pair.
#[derive(Default)]
pub struct HandlerRegistry {
    /// Message handlers by queue URL. First registration wins.
    handlers_by_queue: HashMap<String, HandlerDeclaration>,
    /// Event kinds already bound, per queue URL. First registration wins.
    events_by_queue: HashMap<String, HashSet<QueueEventKind>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message handler for `config.queue_url`.
    ///
    /// Returns `false` (and logs a warning) if the queue already has a
    /// handler; the first-registered handler stays bound. No side effect
    /// beyond the table insert.
    pub fn register_message_handler(
        &mut self,
        config: &MessageHandlerConfig,
        declaration: HandlerDeclaration,
    ) -> bool {
        if self.handlers_by_queue.contains_key(&config.queue_url) {
            tracing::warn!(
                queue_url = %config.queue_url,
                "attempting to bind multiple handlers to the same queue, ignoring subsequent handlers"
            );
            return false;
        }

        self.handlers_by_queue
            .insert(config.queue_url.clone(), declaration);
        true
    }

    /// Reserve the (queue, event) pair for a listener.
    ///
    /// Returns `false` (and logs a warning) if the pair is already bound.
    pub fn register_event_listener(&mut self, config: &EventHandlerConfig) -> bool {
        let bound = self
            .events_by_queue
            .entry(config.queue_url.clone())
            .or_default();

        if bound.contains(&config.event) {
            tracing::warn!(
                queue_url = %config.queue_url,
                event = %config.event,
                "attempting to bind multiple handlers to the same event for this queue, ignoring subsequent handlers"
            );
            return false;
        }

        bound.insert(config.event);
        true
    }

    /// The handler bound to a queue, if any.
    pub fn handler_for(&self, queue_url: &str) -> Option<&HandlerDeclaration> {
        self.handlers_by_queue.get(queue_url)
    }

    /// True if a queue has a message handler.
    pub fn has_handler(&self, queue_url: &str) -> bool {
        self.handlers_by_queue.contains_key(queue_url)
    }

    /// True if the (queue, event) pair has a bound listener.
    pub fn event_bound(&self, queue_url: &str, event: QueueEventKind) -> bool {
        self.events_by_queue
            .get(queue_url)
            .is_some_and(|bound| bound.contains(&event))
    }

    /// Queue URLs with a registered message handler.
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.handlers_by_queue.keys().map(String::as_str)
    }

    /// Number of registered message handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers_by_queue.len()
    }

    /// Fail-fast guard for post-bind registration attempts.
    ///
    /// Dynamic rebinding would need to serialize writers against the
    /// read-only dispatch path; until that exists, attempts outside the
    /// bind phase are rejected.
    pub fn register_late(&self) -> Result<()> {
        Err(QueuewireError::Unsupported(
            "registering listeners outside the bind phase",
        ))
    }
}
