//! Custom gameplay events and the well-known event kinds
//!
//! Entities declare interest in event kinds via
//! [`crate::entity::Entity::handled_events`] and receive them through the
//! [`crate::game::Game::dispatch`] bus. Delivery is synchronous and in
//! registration order; nothing is queued.

use crate::entity::EntityId;

/// Score awarded; `value` is the point amount
pub const SCORE: &str = "score";
/// Ball left the playfield
pub const DRAIN: &str = "drain";
/// Table nudge input
pub const NUDGE: &str = "nudge";
/// Request a sound effect; `value` carries a sound table index
pub const PLAY_SOUND: &str = "play-sound";
/// Stop a looping sound effect
pub const STOP_SOUND: &str = "stop-sound";
/// Graphics quality changed; `value` is the new preset as f32 ordinal
pub const QUALITY: &str = "quality";

/// A gameplay message delivered through the dispatch bus.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    /// Event kind; handlers register for this string
    pub kind: &'static str,
    /// Numeric payload (points, sound index, preset ordinal, ...)
    pub value: f32,
    /// Entity that raised the event, when one did
    pub source: Option<EntityId>,
}

impl GameEvent {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            value: 0.0,
            source: None,
        }
    }

    pub fn with_value(kind: &'static str, value: f32) -> Self {
        Self {
            kind,
            value,
            source: None,
        }
    }

    pub fn from(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }
}
