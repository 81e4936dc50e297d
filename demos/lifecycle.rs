//! Lifecycle - listening to queue consumer events.
//!
//! This demo shows:
//! - Attaching event listeners with `on_queue_event`
//! - Consumer-raised events (`started`, `message_processed`)
//! - Transport-raised events (`error`, `empty`) fired through the handle

use std::sync::Arc;

use queuewire::config::{EventHandlerConfig, MessageHandlerConfig};
use queuewire::consumer::ChannelConsumerFactory;
use queuewire::dispatch::Reply;
use queuewire::handler::extract;
use queuewire::{Message, QueueEventKind, QueueEventPayload, ServerBuilder};

#[tokio::main]
async fn main() -> queuewire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("queuewire=debug,lifecycle=info")
        .init();

    let factory = Arc::new(ChannelConsumerFactory::new());

    let mut server = ServerBuilder::new(factory.clone())
        .handle_queue(MessageHandlerConfig::new("jobs"), |ctx| async move {
            let id = extract::message_id(&ctx)?;
            tracing::info!(id, "job handled");
            Ok(Reply::none())
        })
        .on_queue_event(
            EventHandlerConfig::new("jobs", QueueEventKind::Started),
            |_ctx| async {
                tracing::info!("jobs consumer started polling");
                Ok(Reply::none())
            },
        )
        .on_queue_event(
            EventHandlerConfig::new("jobs", QueueEventKind::MessageProcessed),
            |ctx| async move {
                let event = extract::event_args(&ctx)?;
                tracing::info!(queue = %event.queue_url, "job processed");
                Ok(Reply::none())
            },
        )
        .on_queue_event(
            EventHandlerConfig::new("jobs", QueueEventKind::Error),
            |ctx| async move {
                let event = extract::event_args(&ctx)?;
                if let QueueEventPayload::Error { error, .. } = &event.payload {
                    tracing::warn!(error = %error, "queue reported an error");
                }
                Ok(Reply::none())
            },
        )
        .on_queue_event(
            EventHandlerConfig::new("jobs", QueueEventKind::Empty),
            |_ctx| async {
                tracing::info!("queue is empty");
                Ok(Reply::none())
            },
        )
        .bind()?;

    let jobs = factory.handle("jobs").expect("jobs queue");

    jobs.deliver_one(Message::new("j1", "{}")).await?;

    // An empty poll.
    jobs.deliver(Vec::new()).await?;

    // A transport error.
    jobs.fire(QueueEventPayload::Error {
        error: "receive timed out".to_string(),
        message: None,
    })
    .await?;

    server.shutdown();
    Ok(())
}
