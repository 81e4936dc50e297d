//! Queue lifecycle events.
//!
//! Queue consumers emit a small closed set of lifecycle events alongside the
//! message stream: errors, empty polls, per-message processing notifications
//! and start/stop transitions. The set is modeled as [`QueueEventKind`] so an
//! unknown event name is caught at registration time rather than silently
//! never firing.
//!
//! A fired event is a [`QueueEvent`]: the kind-specific argument tuple
//! ([`QueueEventPayload`]) plus the queue it originated from. The dispatch
//! core treats the payload as opaque — it only routes by kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueuewireError;
use crate::message::Message;

/// The closed set of lifecycle events a queue consumer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    /// Transport-level failure (poll, receive, delete).
    Error,
    /// A message callback returned an error.
    ProcessingError,
    /// A message exceeded its processing deadline.
    TimeoutError,
    /// A poll cycle returned no messages.
    Empty,
    /// A message was received, before its callback ran.
    MessageReceived,
    /// A message callback completed successfully.
    MessageProcessed,
    /// The consumer began polling.
    Started,
    /// The consumer ceased polling.
    Stopped,
}

impl QueueEventKind {
    /// All kinds, in declaration order.
    pub const ALL: [QueueEventKind; 8] = [
        QueueEventKind::Error,
        QueueEventKind::ProcessingError,
        QueueEventKind::TimeoutError,
        QueueEventKind::Empty,
        QueueEventKind::MessageReceived,
        QueueEventKind::MessageProcessed,
        QueueEventKind::Started,
        QueueEventKind::Stopped,
    ];

    /// The event name as the underlying consumer spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEventKind::Error => "error",
            QueueEventKind::ProcessingError => "processing_error",
            QueueEventKind::TimeoutError => "timeout_error",
            QueueEventKind::Empty => "empty",
            QueueEventKind::MessageReceived => "message_received",
            QueueEventKind::MessageProcessed => "message_processed",
            QueueEventKind::Started => "started",
            QueueEventKind::Stopped => "stopped",
        }
    }
}

impl fmt::Display for QueueEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueEventKind {
    type Err = QueuewireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| QueuewireError::UnknownEvent(s.to_string()))
    }
}

/// Kind-specific event arguments, as the consumer passes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueEventPayload {
    /// Transport failure, with the offending message when one is in flight.
    Error {
        error: String,
        message: Option<Message>,
    },
    /// Message callback failure.
    ProcessingError { error: String, message: Message },
    /// Processing deadline exceeded.
    TimeoutError { error: String, message: Message },
    /// Empty poll.
    Empty,
    /// Message received.
    MessageReceived { message: Message },
    /// Message processed.
    MessageProcessed { message: Message },
    /// Polling started.
    Started,
    /// Polling stopped.
    Stopped,
}

impl QueueEventPayload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> QueueEventKind {
        match self {
            QueueEventPayload::Error { .. } => QueueEventKind::Error,
            QueueEventPayload::ProcessingError { .. } => QueueEventKind::ProcessingError,
            QueueEventPayload::TimeoutError { .. } => QueueEventKind::TimeoutError,
            QueueEventPayload::Empty => QueueEventKind::Empty,
            QueueEventPayload::MessageReceived { .. } => QueueEventKind::MessageReceived,
            QueueEventPayload::MessageProcessed { .. } => QueueEventKind::MessageProcessed,
            QueueEventPayload::Started => QueueEventKind::Started,
            QueueEventPayload::Stopped => QueueEventKind::Stopped,
        }
    }
}

/// A fired lifecycle event: argument tuple plus queue metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Queue the event originated from.
    pub queue_url: String,
    /// Kind-specific arguments.
    pub payload: QueueEventPayload,
}

impl QueueEvent {
    /// Create an event for the given queue.
    pub fn new(queue_url: impl Into<String>, payload: QueueEventPayload) -> Self {
        Self {
            queue_url: queue_url.into(),
            payload,
        }
    }

    /// The event's kind.
    pub fn kind(&self) -> QueueEventKind {
        self.payload.kind()
    }
}
