//! Error types for the insets controller.
//!
//! Runtime conditions the controller recovers from (no-op requests, keyboard
//! negotiation failure, control loss, timeouts) are reported through the
//! listener's cancellation callback and never show up here. This type covers
//! caller bugs and failures at the crate's outer edges.

use std::time::Duration;

use thiserror::Error;

use crate::animation::AnimationId;
use crate::config::ConfigError;
use crate::types::InsetTypes;

/// Result type alias for controller operations.
pub type InsetsResult<T> = Result<T, InsetsError>;

/// Errors that can occur while driving inset animations.
#[derive(Debug, Error)]
pub enum InsetsError {
    /// An animation was started on types that are currently being cancelled.
    ///
    /// This happens when a cancellation callback tries to start a new animation
    /// on the very types whose animation is being torn down.
    #[error("cannot start an animation of {requested} while {cancelling} is being cancelled")]
    CancellationInProgress {
        /// Types of the rejected request.
        requested: InsetTypes,
        /// Types whose cancellation is in progress.
        cancelling: InsetTypes,
    },

    /// The animation is no longer running.
    #[error("animation {0} is not running")]
    UnknownAnimation(AnimationId),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The controller actor has stopped.
    #[error("failed to send message to controller actor: channel closed")]
    ActorSend,

    /// The controller actor dropped the reply channel.
    #[error("failed to receive response from controller actor: channel closed")]
    ActorReceive,

    /// A query to the controller actor timed out.
    #[error("controller query timed out after {0:?}")]
    Timeout(Duration),
}

impl InsetsError {
    /// Returns `true` if this error indicates a bug in the caller.
    #[must_use]
    pub const fn is_programmer_error(&self) -> bool {
        matches!(self, Self::CancellationInProgress { .. } | Self::UnknownAnimation(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_in_progress_display() {
        let err = InsetsError::CancellationInProgress {
            requested: InsetTypes::IME,
            cancelling: InsetTypes::IME | InsetTypes::STATUS_BARS,
        };
        let msg = err.to_string();
        assert!(msg.contains("ime"));
        assert!(msg.contains("statusBars|ime"));
        assert!(err.is_programmer_error());
    }

    #[test]
    fn test_unknown_animation_display() {
        let err = InsetsError::UnknownAnimation(AnimationId::new(7));
        assert_eq!(err.to_string(), "animation #7 is not running");
        assert!(err.is_programmer_error());
    }

    #[test]
    fn test_timeout_display() {
        let err = InsetsError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
        assert!(!err.is_programmer_error());
    }

    #[test]
    fn test_config_error_converts() {
        let err: InsetsError = ConfigError::NotFound.into();
        assert!(matches!(err, InsetsError::Config(ConfigError::NotFound)));
    }
}
