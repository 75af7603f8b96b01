//! Error taxonomy for the simulation core
//!
//! Programmer errors fail fast; indexing bugs are surfaced rather than
//! swallowed. Soft asset problems are logged at the call site and never
//! reach this enum.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised by entity lifecycle and dispatch operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// A caller misused the API, e.g. reparenting an entity that already
    /// has a parent.
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// The entity indices disagree with each other. This is a bookkeeping
    /// bug inside the core, not a user error.
    #[error("internal consistency failure on entity {entity:?}: {reason}")]
    InternalConsistency { entity: EntityId, reason: String },
}

impl GameError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        GameError::InvalidOperation {
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent(entity: EntityId, reason: impl Into<String>) -> Self {
        GameError::InternalConsistency {
            entity,
            reason: reason.into(),
        }
    }
}
