//! Per-handler configuration.
//!
//! A handler declaration carries one of two configuration shapes:
//!
//! - [`MessageHandlerConfig`] binds a handler to a queue's message stream
//!   and fixes whether dispatches carry one message or a batch.
//! - [`EventHandlerConfig`] binds a listener to one lifecycle event of a
//!   queue that already has a message handler.
//!
//! Consumer tuning options (visibility timeout, wait time, attribute name
//! filters, ...) ride along in [`ConsumerOptions`], an opaque bag the core
//! forwards to the consumer factory without interpreting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::QueueEventKind;

/// Opaque per-queue consumer options, forwarded verbatim to the factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerOptions(BTreeMap<String, Value>);

impl ConsumerOptions {
    /// Create an empty options bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get an option by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterate over all options.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// True if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Configuration attached to a message handler declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHandlerConfig {
    /// Queue the handler consumes from. Unique across all message handlers.
    pub queue_url: String,
    /// Deliver batches rather than single messages.
    #[serde(default)]
    pub batch: bool,
    /// Opaque consumer tuning options.
    #[serde(default)]
    pub options: ConsumerOptions,
}

impl MessageHandlerConfig {
    /// Configure a single-message handler for the given queue.
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            batch: false,
            options: ConsumerOptions::new(),
        }
    }

    /// Switch batch delivery on or off.
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Set a pass-through consumer option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.set(key, value);
        self
    }
}

/// Configuration attached to a lifecycle event listener declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandlerConfig {
    /// Queue whose consumer the listener attaches to.
    pub queue_url: String,
    /// The lifecycle event to listen for.
    pub event: QueueEventKind,
}

impl EventHandlerConfig {
    /// Configure a listener for one event on one queue.
    pub fn new(queue_url: impl Into<String>, event: QueueEventKind) -> Self {
        Self {
            queue_url: queue_url.into(),
            event,
        }
    }
}

/// The configuration a dispatch context carries: whichever shape produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerConfig {
    /// A message dispatch.
    Message(MessageHandlerConfig),
    /// A lifecycle event dispatch.
    Event(EventHandlerConfig),
}

impl HandlerConfig {
    /// The queue URL, common to both shapes.
    pub fn queue_url(&self) -> &str {
        match self {
            HandlerConfig::Message(cfg) => &cfg.queue_url,
            HandlerConfig::Event(cfg) => &cfg.queue_url,
        }
    }

    /// The message config, if this is a message dispatch.
    pub fn as_message(&self) -> Option<&MessageHandlerConfig> {
        match self {
            HandlerConfig::Message(cfg) => Some(cfg),
            HandlerConfig::Event(_) => None,
        }
    }

    /// The event config, if this is an event dispatch.
    pub fn as_event(&self) -> Option<&EventHandlerConfig> {
        match self {
            HandlerConfig::Message(_) => None,
            HandlerConfig::Event(cfg) => Some(cfg),
        }
    }
}

impl From<MessageHandlerConfig> for HandlerConfig {
    fn from(cfg: MessageHandlerConfig) -> Self {
        HandlerConfig::Message(cfg)
    }
}

impl From<EventHandlerConfig> for HandlerConfig {
    fn from(cfg: EventHandlerConfig) -> Self {
        HandlerConfig::Event(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_config_builder() {
        let cfg = MessageHandlerConfig::new("https://queue/Q1")
            .batch(true)
            .option("wait_time_seconds", 20)
            .option("attribute_names", serde_json::json!(["All"]));

        assert_eq!(cfg.queue_url, "https://queue/Q1");
        assert!(cfg.batch);
        assert_eq!(
            cfg.options.get("wait_time_seconds"),
            Some(&serde_json::json!(20))
        );
    }

    #[test]
    fn test_options_are_opaque_passthrough() {
        // Arbitrary keys survive a serde roundtrip untouched.
        let cfg = MessageHandlerConfig::new("q")
            .option("visibility_timeout", 30)
            .option("custom_vendor_knob", "anything");

        let json = serde_json::to_string(&cfg).unwrap();
        let back: MessageHandlerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(
            back.options.get("custom_vendor_knob"),
            Some(&serde_json::json!("anything"))
        );
    }

    #[test]
    fn test_batch_defaults_to_false() {
        let cfg: MessageHandlerConfig =
            serde_json::from_str(r#"{"queue_url":"q"}"#).unwrap();
        assert!(!cfg.batch);
        assert!(cfg.options.is_empty());
    }

    #[test]
    fn test_handler_config_accessors() {
        let msg: HandlerConfig = MessageHandlerConfig::new("q1").into();
        let evt: HandlerConfig =
            EventHandlerConfig::new("q2", QueueEventKind::Error).into();

        assert_eq!(msg.queue_url(), "q1");
        assert_eq!(evt.queue_url(), "q2");
        assert!(msg.as_message().is_some());
        assert!(msg.as_event().is_none());
        assert_eq!(evt.as_event().unwrap().event, QueueEventKind::Error);
    }
}
