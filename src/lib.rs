//! # queuewire
//!
//! Queue-to-handler dispatch layer.
//!
//! Binds application-defined handlers to remote queues, runs one consumer
//! per queue, and routes every delivered message or lifecycle event to
//! exactly the handler registered for its queue.
//!
//! ## Architecture
//!
//! - **Declarations**: each handler carries a queue config (message
//!   handlers) or a (queue, event) config (lifecycle listeners).
//! - **Binding**: [`ServerBuilder::bind`] registers declarations first-wins,
//!   creates one consumer per message-handler queue via a
//!   [`consumer::ConsumerFactory`], attaches event listeners, then starts
//!   polling.
//! - **Dispatch**: each delivery is wrapped in an immutable
//!   [`DispatchContext`] (raw input, fresh correlation id, handler config)
//!   and routed to the bound handler; handler errors propagate back to the
//!   consumer, which owns ack/nack.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::consumer::ChannelConsumerFactory;
//! use queuewire::dispatch::Reply;
//! use queuewire::handler::extract;
//! use queuewire::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> queuewire::Result<()> {
//!     let factory = Arc::new(ChannelConsumerFactory::new());
//!
//!     let mut server = ServerBuilder::new(factory.clone())
//!         .handle_queue(MessageHandlerConfig::new("https://queue/orders"), |ctx| async move {
//!             let id = extract::message_id(&ctx)?.to_string();
//!             tracing::info!(id, "order received");
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

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod server;

pub use dispatch::{Dispatcher, Reply};
pub use error::{QueuewireError, Result};
pub use event::{QueueEvent, QueueEventKind, QueueEventPayload};
pub use handler::{DispatchContext, HandlerDeclaration};
pub use message::{Envelope, Message};
pub use server::{DispatchServer, ServerBuilder};
