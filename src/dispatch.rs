//! Dispatcher - the runtime path from consumer callback to handler.
//!
//! The queue consumer invokes the dispatcher with a message envelope or a
//! lifecycle event. The dispatcher wraps it in a [`DispatchContext`], invokes
//! the bound handler and resolves the returned [`Reply`] to a concrete value
//! before the dispatch is considered complete. A streaming reply is resolved
//! to its first element; a stream that completes without one is an error.
//!
//! Handler errors are not caught, retried or translated here — they
//! propagate to the consumer callback, which owns the ack/nack decision.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::config::{EventHandlerConfig, MessageHandlerConfig};
use crate::error::{QueuewireError, Result};
use crate::event::QueueEvent;
use crate::handler::{DispatchContext, HandlerDeclaration};
use crate::message::Envelope;

/// Boxed stream of reply values.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// What a handler invocation produces.
///
/// Most handlers return a plain value (or nothing). A handler may instead
/// return a lazily produced stream, whose first element the dispatcher takes
/// as the result.
pub enum Reply {
    /// An already-computed value.
    Value(Value),
    /// A lazily produced stream of values.
    Stream(ReplyStream),
}

impl Reply {
    /// An empty reply, for handlers with nothing to report.
    pub fn none() -> Self {
        Reply::Value(Value::Null)
    }

    /// Reply with a JSON value.
    pub fn value(value: impl Into<Value>) -> Self {
        Reply::Value(value.into())
    }

    /// Reply with any serializable value.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Reply::Value(serde_json::to_value(value)?))
    }

    /// Reply with a stream; the first element becomes the dispatch result.
    pub fn stream(stream: impl Stream<Item = Result<Value>> + Send + 'static) -> Self {
        Reply::Stream(Box::pin(stream))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Bridges the queue consumer's callback to the registered handler.
pub struct Dispatcher;

impl Dispatcher {
    /// Dispatch a message envelope to its handler.
    ///
    /// Builds the context (fresh correlation id), invokes the handler and
    /// resolves the reply.
    ///
    /// # Errors
    ///
    /// Any error raised by the handler, unmodified.
    pub async fn dispatch_message(
        declaration: &HandlerDeclaration,
        config: &MessageHandlerConfig,
        envelope: Envelope,
    ) -> Result<Value> {
        let ctx = DispatchContext::for_message(envelope, config.clone());
        tracing::debug!(
            queue_url = %config.queue_url,
            correlation_id = %ctx.correlation_id(),
            batch = config.batch,
            "dispatching message"
        );

        let reply = declaration.handler.call(ctx).await?;
        Self::resolve(reply).await
    }

    /// Dispatch a lifecycle event to its listener.
    pub async fn dispatch_event(
        declaration: &HandlerDeclaration,
        config: &EventHandlerConfig,
        event: QueueEvent,
    ) -> Result<Value> {
        let ctx = DispatchContext::for_event(event, config.clone());
        tracing::debug!(
            queue_url = %config.queue_url,
            event = %config.event,
            correlation_id = %ctx.correlation_id(),
            "dispatching queue event"
        );

        let reply = declaration.handler.call(ctx).await?;
        Self::resolve(reply).await
    }

    /// Resolve a reply to a concrete value.
    ///
    /// A streaming reply is awaited to its first element; completion without
    /// one is [`QueuewireError::EmptyReply`].
    async fn resolve(reply: Reply) -> Result<Value> {
        match reply {
            Reply::Value(value) => Ok(value),
            Reply::Stream(mut stream) => match stream.next().await {
                Some(first) => first,
                None => Err(QueuewireError::EmptyReply),
            },
        }
    }
}
