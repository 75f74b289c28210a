//! Event types for the Yaktoon event system
//!
//! Services publish on an [`EventBus`]; SSE endpoints subscribe and forward the
//! events that concern their client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Yaktoon event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum YaktoonEvent {
    /// Student record analysis session moved to a new stage or progress value
    MedskyStatusChanged {
        session_id: String,
        stage: String,
        progress: u8,
        message: String,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A student asked the influencer to review an AI reply
    ReviewRequested {
        influencer_slug: String,
        review_request_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The influencer answered a student directly
    InfluencerResponded {
        influencer_slug: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl YaktoonEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            YaktoonEvent::MedskyStatusChanged { .. } => "MedskyStatusChanged",
            YaktoonEvent::ReviewRequested { .. } => "ReviewRequested",
            YaktoonEvent::InfluencerResponded { .. } => "InfluencerResponded",
        }
    }

    /// Analysis session this event belongs to, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            YaktoonEvent::MedskyStatusChanged { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// True once the analysis session can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            YaktoonEvent::MedskyStatusChanged { stage, .. } if stage == "completed" || stage == "error"
        )
    }
}

/// Broadcast bus for [`YaktoonEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<YaktoonEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<YaktoonEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit(&self, event: YaktoonEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
