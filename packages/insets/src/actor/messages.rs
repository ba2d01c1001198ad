//! Message types for the controller actor.
//!
//! All communication with the actor happens through messages:
//! - `InsetsMessage` - events and commands sent to the actor
//! - `InsetsQuery` - requests for controller state (with response channel)
//! - `QueryResult` - responses from queries

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::animation::{
    AnimationControlListener, AnimationId, ControllableInsetsListener, InsetsAnimation,
    Interpolator,
};
use crate::cancellation::CancellationSignal;
use crate::consumer::ControlGrant;
use crate::controller::ListenerId;
use crate::state::InsetsState;
use crate::types::{AnimationKind, InsetType, InsetTypes, Insets, Rect};

// ============================================================================
// Insets Messages
// ============================================================================

/// Messages sent to the controller actor.
pub enum InsetsMessage {
    // ════════════════════════════════════════════════════════════════════════
    // Remote Authority
    // ════════════════════════════════════════════════════════════════════════
    /// A full snapshot pushed by the authority.
    StateChanged(InsetsState),

    /// The full set of control grants held by this window.
    ControlsChanged(Vec<ControlGrant>),

    // ════════════════════════════════════════════════════════════════════════
    // Animation Requests
    // ════════════════════════════════════════════════════════════════════════
    Show { types: InsetTypes, from_ime: bool },

    Hide { types: InsetTypes, from_ime: bool },

    /// Starts a user-driven animation.
    ControlAnimation {
        types: InsetTypes,
        duration: Duration,
        interpolator: Interpolator,
        cancellation: Option<CancellationSignal>,
        listener: Box<dyn AnimationControlListener>,
    },

    /// Next frame of a user-driven animation.
    SetInsetsAndAlpha { id: AnimationId, insets: Insets, alpha: f64, fraction: f64 },

    FinishAnimation { id: AnimationId, shown: bool },

    CancelExistingAnimations,

    // ════════════════════════════════════════════════════════════════════════
    // Window and Input Method
    // ════════════════════════════════════════════════════════════════════════
    /// The input method decided to show or hide the keyboard.
    ImeVisibility(bool),

    /// The window gained (`true`) or lost (`false`) focus.
    WindowFocus(bool),

    FrameChanged(Rect),

    CaptionInsetsHeight(i32),

    AnimationsDisabled(bool),

    /// Forces an animation frame outside the actor's own cadence.
    AnimationFrame,

    // ════════════════════════════════════════════════════════════════════════
    // Listeners
    // ════════════════════════════════════════════════════════════════════════
    AddControllableListener {
        listener: Box<dyn ControllableInsetsListener>,
        respond_to: oneshot::Sender<ListenerId>,
    },

    RemoveControllableListener(ListenerId),

    // ════════════════════════════════════════════════════════════════════════
    // Queries and Lifecycle
    // ════════════════════════════════════════════════════════════════════════
    Query {
        query: InsetsQuery,
        respond_to: oneshot::Sender<QueryResult>,
    },

    /// Stops the actor.
    Shutdown,
}

impl InsetsMessage {
    /// Message name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateChanged(_) => "StateChanged",
            Self::ControlsChanged(_) => "ControlsChanged",
            Self::Show { .. } => "Show",
            Self::Hide { .. } => "Hide",
            Self::ControlAnimation { .. } => "ControlAnimation",
            Self::SetInsetsAndAlpha { .. } => "SetInsetsAndAlpha",
            Self::FinishAnimation { .. } => "FinishAnimation",
            Self::CancelExistingAnimations => "CancelExistingAnimations",
            Self::ImeVisibility(_) => "ImeVisibility",
            Self::WindowFocus(_) => "WindowFocus",
            Self::FrameChanged(_) => "FrameChanged",
            Self::CaptionInsetsHeight(_) => "CaptionInsetsHeight",
            Self::AnimationsDisabled(_) => "AnimationsDisabled",
            Self::AnimationFrame => "AnimationFrame",
            Self::AddControllableListener { .. } => "AddControllableListener",
            Self::RemoveControllableListener(_) => "RemoveControllableListener",
            Self::Query { .. } => "Query",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Debug for InsetsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ============================================================================
// Queries
// ============================================================================

/// Requests for controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsetsQuery {
    State,
    LastDispatchedState,
    RequestedState,
    RunningAnimations,
    AnimationKind(InsetType),
    IsRequestedVisible(InsetType),
    HasPendingImeRequest,
    ControllableTypes,
}

/// Responses to [`InsetsQuery`].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    State(InsetsState),
    Animations(Vec<InsetsAnimation>),
    AnimationKind(Option<AnimationKind>),
    Bool(bool),
    Types(InsetTypes),
}

impl QueryResult {
    #[must_use]
    pub fn into_state(self) -> Option<InsetsState> {
        match self {
            Self::State(state) => Some(state),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_animations(self) -> Option<Vec<InsetsAnimation>> {
        match self {
            Self::Animations(animations) => Some(animations),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_animation_kind(self) -> Option<Option<AnimationKind>> {
        match self {
            Self::AnimationKind(kind) => Some(kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_bool(self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_types(self) -> Option<InsetTypes> {
        match self {
            Self::Types(types) => Some(types),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names() {
        assert_eq!(InsetsMessage::Shutdown.name(), "Shutdown");
        assert_eq!(InsetsMessage::Show { types: InsetTypes::IME, from_ime: true }.name(), "Show");
        assert_eq!(format!("{:?}", InsetsMessage::ImeVisibility(true)), "ImeVisibility");
    }

    #[test]
    fn test_query_result_conversions() {
        assert_eq!(QueryResult::Bool(true).into_bool(), Some(true));
        assert_eq!(QueryResult::Bool(true).into_types(), None);
        assert_eq!(QueryResult::Types(InsetTypes::IME).into_types(), Some(InsetTypes::IME));
        assert_eq!(
            QueryResult::AnimationKind(Some(AnimationKind::User)).into_animation_kind(),
            Some(Some(AnimationKind::User))
        );
        assert!(QueryResult::State(InsetsState::new()).into_state().is_some());
        assert_eq!(QueryResult::Animations(Vec::new()).into_animations(), Some(Vec::new()));
    }
}
