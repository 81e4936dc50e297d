//! Message and envelope types.
//!
//! A [`Message`] is the unit the queue transport delivers: an opaque string
//! body plus queue attributes and user-defined message attributes. An
//! [`Envelope`] is what a dispatch actually carries — either one message or
//! an ordered batch, depending on the owning queue's `batch` configuration.
//!
//! # Example
//!
//! ```
//! use queuewire::message::{Envelope, Message};
//!
//! let msg = Message::new("m1", r#"{"test":"x"}"#);
//! let envelope = Envelope::Single(msg);
//!
//! assert!(!envelope.is_batch());
//! assert_eq!(envelope.messages().len(), 1);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single message delivered from a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned message id.
    pub id: String,
    /// Raw message body. Often JSON, but the core does not assume so.
    pub body: String,
    /// Queue-level attributes (sender id, timestamps, ...).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// User-defined message attributes.
    #[serde(default)]
    pub message_attributes: HashMap<String, String>,
}

impl Message {
    /// Create a message with the given id and body.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Attach a queue attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach a user-defined message attribute.
    pub fn with_message_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.message_attributes.insert(key.into(), value.into());
        self
    }

    /// Parse the body as JSON into the given type.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the body is not valid JSON for `T`.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// One dispatch worth of messages: a single message or an ordered batch.
///
/// Which variant a queue produces is fixed at bind time by the queue's
/// `batch` flag and never mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// One message per dispatch (`batch = false`).
    Single(Message),
    /// An ordered batch per dispatch (`batch = true`).
    Batch(Vec<Message>),
}

impl Envelope {
    /// True if this envelope is a batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, Envelope::Batch(_))
    }

    /// View the contained messages as a slice, regardless of variant.
    pub fn messages(&self) -> &[Message] {
        match self {
            Envelope::Single(msg) => std::slice::from_ref(msg),
            Envelope::Batch(msgs) => msgs,
        }
    }

    /// The first message, if any. A `Single` envelope always has one.
    pub fn first(&self) -> Option<&Message> {
        self.messages().first()
    }

    /// Number of messages carried.
    pub fn len(&self) -> usize {
        self.messages().len()
    }

    /// True if a batch envelope carries no messages.
    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

impl From<Message> for Envelope {
    fn from(msg: Message) -> Self {
        Envelope::Single(msg)
    }
}

impl From<Vec<Message>> for Envelope {
    fn from(msgs: Vec<Message>) -> Self {
        Envelope::Batch(msgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = Message::new("m1", "body")
            .with_attribute("SenderId", "abc")
            .with_message_attribute("trace", "t-1");

        assert_eq!(msg.id, "m1");
        assert_eq!(msg.body, "body");
        assert_eq!(msg.attributes.get("SenderId").map(String::as_str), Some("abc"));
        assert_eq!(
            msg.message_attributes.get("trace").map(String::as_str),
            Some("t-1")
        );
    }

    #[test]
    fn test_json_body() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Payload {
            test: String,
        }

        let msg = Message::new("m1", r#"{"test":"x"}"#);
        let payload: Payload = msg.json_body().unwrap();
        assert_eq!(payload.test, "x");
    }

    #[test]
    fn test_json_body_invalid() {
        let msg = Message::new("m1", "not json");
        let result: Result<serde_json::Value> = msg.json_body();
        assert!(result.is_err());
    }

    #[test]
    fn test_single_envelope() {
        let envelope = Envelope::from(Message::new("m1", "a"));

        assert!(!envelope.is_batch());
        assert_eq!(envelope.len(), 1);
        assert_eq!(envelope.first().unwrap().id, "m1");
    }

    #[test]
    fn test_batch_envelope() {
        let envelope = Envelope::from(vec![Message::new("m1", "a"), Message::new("m2", "b")]);

        assert!(envelope.is_batch());
        assert_eq!(envelope.len(), 2);
        assert_eq!(envelope.messages()[1].id, "m2");
    }

    #[test]
    fn test_empty_batch() {
        let envelope = Envelope::Batch(Vec::new());
        assert!(envelope.is_empty());
        assert!(envelope.first().is_none());
    }

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = Message::new("m1", "body").with_attribute("k", "v");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
