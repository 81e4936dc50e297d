//! Dispatch context passed to handlers.
//!
//! A [`DispatchContext`] is an immutable snapshot created for every handler
//! invocation: the raw input (message envelope or event arguments), a freshly
//! generated correlation id and the configuration the handler was registered
//! with. Handlers and extraction helpers read from it; nothing mutates it.
//!
//! # Example
//!
//! ```
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::handler::DispatchContext;
//! use queuewire::message::{Envelope, Message};
//!
//! let ctx = DispatchContext::for_message(
//!     Envelope::Single(Message::new("m1", "{}")),
//!     MessageHandlerConfig::new("https://queue/Q1"),
//! );
//!
//! assert_eq!(ctx.config().queue_url(), "https://queue/Q1");
//! assert!(!ctx.correlation_id().is_empty());
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{EventHandlerConfig, HandlerConfig, MessageHandlerConfig};
use crate::event::QueueEvent;
use crate::message::Envelope;

/// The raw input a dispatch carries.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchInput {
    /// A data message dispatch: one message or a batch.
    Message(Envelope),
    /// A lifecycle event dispatch: the event's argument tuple.
    Event(QueueEvent),
}

impl DispatchInput {
    /// The message envelope, if this is a message dispatch.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            DispatchInput::Message(envelope) => Some(envelope),
            DispatchInput::Event(_) => None,
        }
    }

    /// The event arguments, if this is an event dispatch.
    pub fn event(&self) -> Option<&QueueEvent> {
        match self {
            DispatchInput::Message(_) => None,
            DispatchInput::Event(event) => Some(event),
        }
    }
}

struct ContextInner {
    input: DispatchInput,
    correlation_id: String,
    config: HandlerConfig,
}

/// Immutable per-dispatch context handed to a handler invocation.
///
/// Cheaply cloneable; clones share the same snapshot. Created by the
/// dispatcher and discarded when the invocation returns.
#[derive(Clone)]
pub struct DispatchContext {
    inner: Arc<ContextInner>,
}

impl DispatchContext {
    /// Build a context for a message dispatch, with a fresh correlation id.
    pub fn for_message(envelope: Envelope, config: MessageHandlerConfig) -> Self {
        Self::new(DispatchInput::Message(envelope), config.into())
    }

    /// Build a context for an event dispatch, with a fresh correlation id.
    pub fn for_event(event: QueueEvent, config: EventHandlerConfig) -> Self {
        Self::new(DispatchInput::Event(event), config.into())
    }

    fn new(input: DispatchInput, config: HandlerConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                input,
                correlation_id: Uuid::new_v4().to_string(),
                config,
            }),
        }
    }

    /// The raw input: message envelope or event argument tuple.
    pub fn raw_input(&self) -> &DispatchInput {
        &self.inner.input
    }

    /// The correlation id generated for this dispatch.
    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    /// The configuration the handler was registered with.
    pub fn config(&self) -> &HandlerConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("correlation_id", &self.inner.correlation_id)
            .field("queue_url", &self.inner.config.queue_url())
            .finish_non_exhaustive()
    }
}
