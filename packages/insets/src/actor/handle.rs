//! Handle for communicating with the controller actor.
//!
//! The `InsetsActorHandle` is a cloneable front door to an
//! [`InsetsController`](crate::InsetsController) running on its own task.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::messages::{InsetsMessage, InsetsQuery, QueryResult};
use crate::animation::{AnimationControlListener, ControllableInsetsListener, InsetsAnimation, Interpolator};
use crate::cancellation::CancellationSignal;
use crate::consumer::ControlGrant;
use crate::controller::ListenerId;
use crate::error::{InsetsError, InsetsResult};
use crate::state::InsetsState;
use crate::types::{AnimationKind, InsetType, InsetTypes, Rect};

/// Handle for communicating with the controller actor.
///
/// This handle is cheap to clone and can be shared across threads.
#[derive(Clone, Debug)]
pub struct InsetsActorHandle {
    sender: mpsc::Sender<InsetsMessage>,
}

impl InsetsActorHandle {
    pub(crate) const fn new(sender: mpsc::Sender<InsetsMessage>) -> Self { Self { sender } }

    // ========================================================================
    // Fire-and-forget sending
    // ========================================================================

    /// Queues a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped or its
    /// queue is full.
    pub fn send(&self, msg: InsetsMessage) -> InsetsResult<()> {
        self.sender.try_send(msg).map_err(|_| InsetsError::ActorSend)
    }

    /// Sends a message, waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn send_async(&self, msg: InsetsMessage) -> InsetsResult<()> {
        self.sender.send(msg).await.map_err(|_| InsetsError::ActorSend)
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Executes a query and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped, or
    /// [`InsetsError::ActorReceive`] if it dropped the reply.
    pub async fn query(&self, query: InsetsQuery) -> InsetsResult<QueryResult> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(InsetsMessage::Query { query, respond_to: tx })
            .await
            .map_err(|_| InsetsError::ActorSend)?;
        rx.await.map_err(|_| InsetsError::ActorReceive)
    }

    /// Executes a query, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::Timeout`] if no reply arrives in time, plus
    /// the errors of [`Self::query`].
    pub async fn query_timeout(&self, query: InsetsQuery, timeout: Duration) -> InsetsResult<QueryResult> {
        tokio::time::timeout(timeout, self.query(query))
            .await
            .map_err(|_| InsetsError::Timeout(timeout))?
    }

    /// The live snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn state(&self) -> InsetsResult<InsetsState> {
        let result = self.query(InsetsQuery::State).await?;
        Ok(result.into_state().unwrap_or_default())
    }

    /// The last snapshot sent to the remote authority.
    ///
    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn requested_state(&self) -> InsetsResult<InsetsState> {
        let result = self.query(InsetsQuery::RequestedState).await?;
        Ok(result.into_state().unwrap_or_default())
    }

    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn running_animations(&self) -> InsetsResult<Vec<InsetsAnimation>> {
        let result = self.query(InsetsQuery::RunningAnimations).await?;
        Ok(result.into_animations().unwrap_or_default())
    }

    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn animation_kind(&self, ty: InsetType) -> InsetsResult<Option<AnimationKind>> {
        let result = self.query(InsetsQuery::AnimationKind(ty)).await?;
        Ok(result.into_animation_kind().flatten())
    }

    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn is_requested_visible(&self, ty: InsetType) -> InsetsResult<bool> {
        let result = self.query(InsetsQuery::IsRequestedVisible(ty)).await?;
        Ok(result.into_bool().unwrap_or_else(|| ty.default_visibility()))
    }

    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn has_pending_ime_request(&self) -> InsetsResult<bool> {
        let result = self.query(InsetsQuery::HasPendingImeRequest).await?;
        Ok(result.into_bool().unwrap_or(false))
    }

    /// # Errors
    ///
    /// See [`Self::query`].
    pub async fn controllable_types(&self) -> InsetsResult<InsetTypes> {
        let result = self.query(InsetsQuery::ControllableTypes).await?;
        Ok(result.into_types().unwrap_or_default())
    }

    // ========================================================================
    // Convenience senders
    // ========================================================================

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn on_state_changed(&self, state: InsetsState) -> InsetsResult<()> {
        self.send_async(InsetsMessage::StateChanged(state)).await
    }

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn on_controls_changed(&self, grants: Vec<ControlGrant>) -> InsetsResult<()> {
        self.send_async(InsetsMessage::ControlsChanged(grants)).await
    }

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn on_frame_changed(&self, frame: Rect) -> InsetsResult<()> {
        self.send_async(InsetsMessage::FrameChanged(frame)).await
    }

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn show(&self, types: InsetTypes) -> InsetsResult<()> {
        self.send_async(InsetsMessage::Show { types, from_ime: false }).await
    }

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn hide(&self, types: InsetTypes) -> InsetsResult<()> {
        self.send_async(InsetsMessage::Hide { types, from_ime: false }).await
    }

    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn apply_ime_visibility(&self, visible: bool) -> InsetsResult<()> {
        self.send_async(InsetsMessage::ImeVisibility(visible)).await
    }

    /// Starts a user-driven animation on the actor.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has stopped.
    pub async fn control_animation(
        &self,
        types: InsetTypes,
        duration: Duration,
        interpolator: Interpolator,
        cancellation: Option<CancellationSignal>,
        listener: Box<dyn AnimationControlListener>,
    ) -> InsetsResult<()> {
        self.send_async(InsetsMessage::ControlAnimation {
            types,
            duration,
            interpolator,
            cancellation,
            listener,
        })
        .await
    }

    /// Registers a controllable-insets listener.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] or [`InsetsError::ActorReceive`]
    /// if the actor has stopped.
    pub async fn add_controllable_listener(
        &self,
        listener: Box<dyn ControllableInsetsListener>,
    ) -> InsetsResult<ListenerId> {
        let (tx, rx) = oneshot::channel();
        self.send_async(InsetsMessage::AddControllableListener { listener, respond_to: tx }).await?;
        rx.await.map_err(|_| InsetsError::ActorReceive)
    }

    /// Stops the actor after the messages already queued.
    ///
    /// # Errors
    ///
    /// Returns [`InsetsError::ActorSend`] if the actor has already stopped.
    pub async fn shutdown(&self) -> InsetsResult<()> { self.send_async(InsetsMessage::Shutdown).await }

    /// Whether the actor is still receiving messages.
    #[must_use]
    pub fn is_alive(&self) -> bool { !self.sender.is_closed() }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_closed_detection() {
        let (tx, rx) = mpsc::channel(1);
        let handle = InsetsActorHandle::new(tx);
        assert!(handle.is_alive());

        drop(rx);
        assert!(!handle.is_alive());
        assert!(matches!(handle.send(InsetsMessage::AnimationFrame), Err(InsetsError::ActorSend)));
        assert!(matches!(handle.query(InsetsQuery::State).await, Err(InsetsError::ActorSend)));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_receive_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = InsetsActorHandle::new(tx);

        let responder = tokio::spawn(async move {
            if let Some(InsetsMessage::Query { respond_to, .. }) = rx.recv().await {
                drop(respond_to);
            }
        });
        let result = handle.query(InsetsQuery::ControllableTypes).await;
        assert!(matches!(result, Err(InsetsError::ActorReceive)));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let (tx, _rx) = mpsc::channel(4);
        let handle = InsetsActorHandle::new(tx);

        let timeout = Duration::from_millis(20);
        let result = handle.query_timeout(InsetsQuery::State, timeout).await;
        assert!(matches!(result, Err(InsetsError::Timeout(t)) if t == timeout));
    }

    #[tokio::test]
    async fn test_send_fails_when_queue_full() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = InsetsActorHandle::new(tx);

        assert!(handle.send(InsetsMessage::AnimationFrame).is_ok());
        assert!(matches!(handle.send(InsetsMessage::AnimationFrame), Err(InsetsError::ActorSend)));
    }
}
