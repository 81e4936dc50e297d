//! Worker - binding message handlers to queues.
//!
//! This demo shows:
//! - Registering a single-message handler with `handle_queue`
//! - Registering a typed JSON handler with `handle_json`
//! - Registering a batch handler on a second queue
//! - Driving the in-process channel transport with `QueueHandle`

use std::sync::Arc;

use queuewire::config::MessageHandlerConfig;
use queuewire::consumer::ChannelConsumerFactory;
use queuewire::dispatch::Reply;
use queuewire::handler::extract;
use queuewire::{Message, ServerBuilder};
use serde::Deserialize;

/// Payload for the orders queue.
#[derive(Deserialize, Debug)]
struct Order {
    sku: String,
    quantity: u32,
}

#[tokio::main]
async fn main() -> queuewire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("queuewire=debug,worker=info")
        .init();

    let factory = Arc::new(ChannelConsumerFactory::new());

    let mut server = ServerBuilder::new(factory.clone())
        .handle_json(
            MessageHandlerConfig::new("orders"),
            |order: Order, ctx| async move {
                tracing::info!(
                    sku = %order.sku,
                    quantity = order.quantity,
                    correlation_id = %ctx.correlation_id(),
                    "order received"
                );
                Ok(Reply::none())
            },
        )
        .handle_queue(
            MessageHandlerConfig::new("audit").batch(true),
            |ctx| async move {
                let messages = extract::batch_messages(&ctx)?;
                tracing::info!(count = messages.len(), "audit batch received");
                Ok(Reply::none())
            },
        )
        .bind()?;

    let orders = factory.handle("orders").expect("orders queue");
    orders
        .deliver_one(Message::new("m1", r#"{"sku":"widget","quantity":3}"#))
        .await?;
    orders
        .deliver_one(Message::new("m2", r#"{"sku":"gadget","quantity":1}"#))
        .await?;

    let audit = factory.handle("audit").expect("audit queue");
    audit
        .deliver(vec![
            Message::new("a1", "created"),
            Message::new("a2", "updated"),
            Message::new("a3", "deleted"),
        ])
        .await?;

    server.shutdown();
    Ok(())
}
