//! Queue consumer abstraction.
//!
//! The dispatch core does not poll queues itself; it binds handlers to
//! consumers supplied by the host through two traits:
//!
//! - [`ConsumerFactory`] builds one [`QueueConsumer`] per queue, configured
//!   with that queue's options and a message callback shaped by the queue's
//!   `batch` flag.
//! - [`QueueConsumer`] is the per-queue worker: lifecycle listeners attach
//!   before it starts, [`QueueConsumer::start`] begins polling (idempotent)
//!   and [`QueueConsumer::stop`] ceases polling without cancelling in-flight
//!   callbacks.
//!
//! The consumer owns the ack/nack decision: the message callback's `Result`
//! tells it whether processing succeeded.
//!
//! [`ChannelConsumerFactory`] is an in-process implementation backed by
//! channels, used by the demos and tests.

mod channel;

use std::sync::Arc;

use crate::config::MessageHandlerConfig;
use crate::error::Result;
use crate::event::{QueueEvent, QueueEventKind};
use crate::handler::BoxFuture;
use crate::message::Envelope;

pub use channel::{ChannelConsumer, ChannelConsumerFactory, QueueHandle};

/// Callback a consumer invokes per delivery. The envelope shape matches the
/// queue's `batch` flag; the returned result drives ack/nack.
pub type MessageCallback = Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Callback a consumer invokes when a subscribed lifecycle event fires.
pub type EventCallback = Arc<dyn Fn(QueueEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// A per-queue polling worker.
pub trait QueueConsumer: Send {
    /// Attach a listener for one lifecycle event.
    ///
    /// Must be called before [`QueueConsumer::start`]; late subscriptions
    /// are ignored with a warning. At most one listener per event kind.
    fn subscribe(&mut self, kind: QueueEventKind, listener: EventCallback);

    /// Begin polling. Idempotent: a started consumer stays started.
    fn start(&mut self);

    /// Cease polling. In-flight callbacks run to completion; no new
    /// deliveries are processed.
    fn stop(&mut self);

    /// True while the consumer is polling.
    fn is_running(&self) -> bool;
}

/// Builds a consumer for one queue.
pub trait ConsumerFactory: Send + Sync {
    /// Create a consumer for `config.queue_url`, forwarding the opaque
    /// options and wiring the message callback.
    ///
    /// # Errors
    ///
    /// Transport-specific construction failures.
    fn create(
        &self,
        config: &MessageHandlerConfig,
        callback: MessageCallback,
    ) -> Result<Box<dyn QueueConsumer>>;
}
