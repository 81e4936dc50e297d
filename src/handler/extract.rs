//! Accessor functions over a [`DispatchContext`].
//!
//! Each function extracts one piece of a dispatch — the message, its id,
//! its body (raw, parsed or typed), its attributes, the batch, the event
//! arguments — so handlers and host-framework plumbing can pick apart the
//! raw input without touching it. All accessors are read-only.
//!
//! # Example
//!
//! ```
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::handler::{extract, DispatchContext};
//! use queuewire::message::{Envelope, Message};
//!
//! let ctx = DispatchContext::for_message(
//!     Envelope::Single(Message::new("m1", r#"{"test":"x"}"#)),
//!     MessageHandlerConfig::new("https://queue/Q1"),
//! );
//!
//! assert_eq!(extract::message_id(&ctx).unwrap(), "m1");
//! assert_eq!(extract::body(&ctx).unwrap()["test"], "x");
//! ```

use serde_json::Value;

use super::DispatchContext;
use crate::error::{QueuewireError, Result};
use crate::event::QueueEvent;
use crate::message::{Envelope, Message};

fn context_err(what: &str) -> QueuewireError {
    QueuewireError::Context(what.to_string())
}

/// The single message of a non-batch dispatch.
pub fn message(ctx: &DispatchContext) -> Result<&Message> {
    match ctx.raw_input().envelope() {
        Some(Envelope::Single(msg)) => Ok(msg),
        Some(Envelope::Batch(_)) => Err(context_err("expected a single message, got a batch")),
        None => Err(context_err("expected a message dispatch, got an event")),
    }
}

/// The ordered messages of a batch dispatch.
pub fn batch_messages(ctx: &DispatchContext) -> Result<&[Message]> {
    match ctx.raw_input().envelope() {
        Some(Envelope::Batch(msgs)) => Ok(msgs),
        Some(Envelope::Single(_)) => Err(context_err("expected a batch, got a single message")),
        None => Err(context_err("expected a message dispatch, got an event")),
    }
}

/// The transport-assigned id of the single message.
pub fn message_id(ctx: &DispatchContext) -> Result<&str> {
    Ok(message(ctx)?.id.as_str())
}

/// The raw body string of the single message.
pub fn raw_body(ctx: &DispatchContext) -> Result<&str> {
    Ok(message(ctx)?.body.as_str())
}

/// The single message's body parsed as JSON.
pub fn body(ctx: &DispatchContext) -> Result<Value> {
    message(ctx)?.json_body()
}

/// One top-level field of the JSON body, `None` when absent.
pub fn body_field(ctx: &DispatchContext, key: &str) -> Result<Option<Value>> {
    Ok(body(ctx)?.get(key).cloned())
}

/// The single message's body parsed into a user type.
pub fn json_body<T: serde::de::DeserializeOwned>(ctx: &DispatchContext) -> Result<T> {
    message(ctx)?.json_body()
}

/// All queue-level attributes of the single message.
pub fn attributes(ctx: &DispatchContext) -> Result<&std::collections::HashMap<String, String>> {
    Ok(&message(ctx)?.attributes)
}

/// One queue-level attribute by name, `None` when absent.
pub fn attribute<'a>(ctx: &'a DispatchContext, key: &str) -> Result<Option<&'a str>> {
    Ok(message(ctx)?.attributes.get(key).map(String::as_str))
}

/// All user-defined message attributes of the single message.
pub fn message_attributes(
    ctx: &DispatchContext,
) -> Result<&std::collections::HashMap<String, String>> {
    Ok(&message(ctx)?.message_attributes)
}

/// One user-defined message attribute by name, `None` when absent.
pub fn message_attribute<'a>(ctx: &'a DispatchContext, key: &str) -> Result<Option<&'a str>> {
    Ok(message(ctx)?
        .message_attributes
        .get(key)
        .map(String::as_str))
}

/// The argument tuple of an event dispatch.
pub fn event_args(ctx: &DispatchContext) -> Result<&QueueEvent> {
    ctx.raw_input()
        .event()
        .ok_or_else(|| context_err("expected an event dispatch, got a message"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EventHandlerConfig, MessageHandlerConfig};
    use crate::event::{QueueEventKind, QueueEventPayload};
    use crate::message::Envelope;
    use serde::Deserialize;

    fn single_ctx() -> DispatchContext {
        let msg = Message::new("m1", r#"{"test":"x","count":2}"#)
            .with_attribute("SenderId", "abc")
            .with_message_attribute("trace", "t-1");
        DispatchContext::for_message(Envelope::Single(msg), MessageHandlerConfig::new("q1"))
    }

    fn batch_ctx() -> DispatchContext {
        let envelope = Envelope::Batch(vec![Message::new("m1", "{}"), Message::new("m2", "{}")]);
        DispatchContext::for_message(envelope, MessageHandlerConfig::new("q1").batch(true))
    }

    fn event_ctx() -> DispatchContext {
        DispatchContext::for_event(
            QueueEvent::new("q1", QueueEventPayload::Empty),
            EventHandlerConfig::new("q1", QueueEventKind::Empty),
        )
    }

    #[test]
    fn test_message_and_id() {
        let ctx = single_ctx();
        assert_eq!(message(&ctx).unwrap().id, "m1");
        assert_eq!(message_id(&ctx).unwrap(), "m1");
    }

    #[test]
    fn test_body_accessors() {
        let ctx = single_ctx();

        assert_eq!(raw_body(&ctx).unwrap(), r#"{"test":"x","count":2}"#);
        assert_eq!(body(&ctx).unwrap()["count"], 2);
        assert_eq!(
            body_field(&ctx, "test").unwrap(),
            Some(serde_json::json!("x"))
        );
        assert_eq!(body_field(&ctx, "missing").unwrap(), None);
    }

    #[test]
    fn test_typed_body() {
        #[derive(Deserialize)]
        struct Payload {
            test: String,
        }

        let ctx = single_ctx();
        let payload: Payload = json_body(&ctx).unwrap();
        assert_eq!(payload.test, "x");
    }

    #[test]
    fn test_attribute_accessors() {
        let ctx = single_ctx();

        assert_eq!(attribute(&ctx, "SenderId").unwrap(), Some("abc"));
        assert_eq!(attribute(&ctx, "missing").unwrap(), None);
        assert_eq!(attributes(&ctx).unwrap().len(), 1);
        assert_eq!(message_attribute(&ctx, "trace").unwrap(), Some("t-1"));
        assert_eq!(message_attributes(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_batch_messages() {
        let ctx = batch_ctx();
        let messages = batch_messages(&ctx).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, "m2");
    }

    #[test]
    fn test_single_accessor_rejects_batch() {
        let ctx = batch_ctx();
        assert!(matches!(
            message(&ctx),
            Err(QueuewireError::Context(_))
        ));
    }

    #[test]
    fn test_batch_accessor_rejects_single() {
        let ctx = single_ctx();
        assert!(matches!(
            batch_messages(&ctx),
            Err(QueuewireError::Context(_))
        ));
    }

    #[test]
    fn test_message_accessors_reject_event() {
        let ctx = event_ctx();
        assert!(message(&ctx).is_err());
        assert!(batch_messages(&ctx).is_err());
    }

    #[test]
    fn test_event_args() {
        let ctx = event_ctx();
        assert_eq!(event_args(&ctx).unwrap().kind(), QueueEventKind::Empty);
        assert!(event_args(&single_ctx()).is_err());
    }
}
