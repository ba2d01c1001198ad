//! Controller actor.
//!
//! The actor owns an [`InsetsController`] on its own tokio task and gives it
//! the single owner it expects. It processes messages sequentially,
//! drains events posted by off-thread drivers and cancellation signals,
//! fires delayed tasks when they come due and ticks animation frames while
//! any animation needs them.
//!
//! # Panic Recovery
//!
//! If a message handler panics the panic is caught and logged, and the actor
//! keeps processing subsequent messages. The controller may be partially
//! inconsistent afterwards but the window keeps working.

mod handle;
mod messages;

use std::future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

pub use handle::InsetsActorHandle;
pub use messages::{InsetsMessage, InsetsQuery, QueryResult};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;

use crate::controller::InsetsController;
use crate::scheduler::OwnerEvent;

/// Channel buffer size for the controller actor.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Owns an [`InsetsController`] and processes messages sequentially.
pub struct InsetsActor {
    controller: InsetsController,
    receiver: mpsc::Receiver<InsetsMessage>,
    events: Option<UnboundedReceiver<OwnerEvent>>,
}

impl InsetsActor {
    /// Spawns the actor on the current tokio runtime.
    ///
    /// Host callbacks run on the actor task. The actor ticks
    /// [`InsetsController::on_animation_frame`] itself at the configured
    /// frame interval, so hosts may ignore
    /// [`crate::Host::post_animation_callback`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(mut controller: InsetsController) -> InsetsActorHandle {
        tracing::debug!("spawning insets controller actor");
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let events = controller.take_event_receiver();

        let actor = Self { controller, receiver, events };
        tokio::spawn(actor.run());

        InsetsActorHandle::new(sender)
    }

    async fn run(mut self) {
        let mut frames = tokio::time::interval(self.controller.config().frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let deadline = self.controller.next_deadline();
            let wants_frame = self.controller.wants_animation_frame();

            tokio::select! {
                msg = self.receiver.recv() => {
                    let Some(msg) = msg else {
                        tracing::debug!("all handles dropped, stopping insets actor");
                        break;
                    };
                    if matches!(msg, InsetsMessage::Shutdown) {
                        tracing::debug!("insets actor shutting down");
                        break;
                    }
                    let name = msg.name();
                    self.guarded(name, move |controller| handle_message(controller, msg));
                }
                Some(event) = next_event(&mut self.events) => {
                    self.guarded("OwnerEvent", move |controller| controller.handle_owner_event(event));
                }
                () = sleep_until(deadline) => {}
                _ = frames.tick(), if wants_frame => {
                    self.guarded("AnimationFrame", InsetsController::on_animation_frame);
                }
            }

            self.guarded("Scheduled", InsetsController::run_scheduled);
        }
        self.controller.cancel_existing_animations();
    }

    /// Runs `f` with panic recovery.
    fn guarded(&mut self, name: &str, f: impl FnOnce(&mut InsetsController)) {
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut self.controller)));
        if let Err(panic_info) = result {
            let panic_msg = panic_info
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            tracing::error!("PANIC in insets actor while handling '{name}': {panic_msg}");
            tracing::error!("insets actor recovered from panic - state may be inconsistent");
        }
    }
}

async fn next_event(events: &mut Option<UnboundedReceiver<OwnerEvent>>) -> Option<OwnerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}

fn handle_message(controller: &mut InsetsController, msg: InsetsMessage) {
    let result = match msg {
        InsetsMessage::StateChanged(state) => {
            controller.on_state_changed(&state);
            Ok(())
        }
        InsetsMessage::ControlsChanged(grants) => controller.on_controls_changed(&grants),
        InsetsMessage::Show { types, from_ime: true } => controller.show_from_ime(types),
        InsetsMessage::Show { types, from_ime: false } => controller.show(types),
        InsetsMessage::Hide { types, from_ime: true } => controller.hide_from_ime(types),
        InsetsMessage::Hide { types, from_ime: false } => controller.hide(types),
        InsetsMessage::ControlAnimation { types, duration, interpolator, cancellation, listener } => {
            controller.control_animation(types, duration, interpolator, cancellation, listener)
        }
        InsetsMessage::SetInsetsAndAlpha { id, insets, alpha, fraction } => {
            controller.set_insets_and_alpha(id, insets, alpha, fraction)
        }
        InsetsMessage::FinishAnimation { id, shown } => controller.finish_animation(id, shown),
        InsetsMessage::CancelExistingAnimations => {
            controller.cancel_existing_animations();
            Ok(())
        }
        InsetsMessage::ImeVisibility(visible) => controller.apply_ime_visibility(visible),
        InsetsMessage::WindowFocus(true) => {
            controller.on_window_focus_gained();
            Ok(())
        }
        InsetsMessage::WindowFocus(false) => {
            controller.on_window_focus_lost();
            Ok(())
        }
        InsetsMessage::FrameChanged(frame) => {
            controller.on_frame_changed(frame);
            Ok(())
        }
        InsetsMessage::CaptionInsetsHeight(height) => {
            controller.set_caption_insets_height(height);
            Ok(())
        }
        InsetsMessage::AnimationsDisabled(disabled) => {
            controller.set_animations_disabled(disabled);
            Ok(())
        }
        InsetsMessage::AnimationFrame => {
            controller.on_animation_frame();
            Ok(())
        }
        InsetsMessage::AddControllableListener { listener, respond_to } => {
            let id = controller.add_controllable_insets_listener(listener);
            let _ = respond_to.send(id);
            Ok(())
        }
        InsetsMessage::RemoveControllableListener(id) => {
            controller.remove_controllable_insets_listener(id);
            Ok(())
        }
        InsetsMessage::Query { query, respond_to } => {
            let _ = respond_to.send(execute_query(controller, query));
            Ok(())
        }
        InsetsMessage::Shutdown => Ok(()),
    };

    if let Err(err) = result {
        tracing::error!("insets actor: {err}");
    }
}

fn execute_query(controller: &InsetsController, query: InsetsQuery) -> QueryResult {
    match query {
        InsetsQuery::State => QueryResult::State(controller.state().clone()),
        InsetsQuery::LastDispatchedState => QueryResult::State(controller.last_dispatched_state().clone()),
        InsetsQuery::RequestedState => QueryResult::State(controller.requested_state().clone()),
        InsetsQuery::RunningAnimations => QueryResult::Animations(controller.running_animations()),
        InsetsQuery::AnimationKind(ty) => QueryResult::AnimationKind(controller.animation_kind(ty)),
        InsetsQuery::IsRequestedVisible(ty) => QueryResult::Bool(controller.is_requested_visible(ty)),
        InsetsQuery::HasPendingImeRequest => QueryResult::Bool(controller.has_pending_ime_request()),
        InsetsQuery::ControllableTypes => QueryResult::Types(controller.controllable_types()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::ControllerConfig;
    use crate::consumer::ControlGrant;
    use crate::host::{Host, NoInputMethod};
    use crate::state::{InsetsSource, InsetsState};
    use crate::types::{InsetType, InsetTypes, Rect};

    const DISPLAY: Rect = Rect::new(0, 0, 1080, 1920);

    #[derive(Default)]
    struct CountingHost {
        callbacks: bool,
        modified: Arc<Mutex<usize>>,
    }

    impl Host for CountingHost {
        fn notify_insets_changed(&mut self) {}

        fn on_insets_modified(&mut self, _requested: &InsetsState) { *self.modified.lock() += 1; }

        fn has_animation_callbacks(&self) -> bool { self.callbacks }

        fn post_animation_callback(&mut self) {}
    }

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            show_duration_ms: 48,
            hide_duration_ms: 48,
            sync_ime_duration_ms: 48,
            unsync_ime_duration_ms: 48,
            frame_interval_ms: 4,
            ..ControllerConfig::default()
        }
    }

    fn spawn_actor(callbacks: bool) -> InsetsActorHandle {
        let host = CountingHost { callbacks, ..CountingHost::default() };
        let controller = InsetsController::new(Box::new(host), Box::new(NoInputMethod), fast_config());
        InsetsActor::spawn(controller)
    }

    fn status_bar_state(visible: bool) -> InsetsState {
        InsetsState::with_sources(
            DISPLAY,
            [InsetsSource::new(InsetType::StatusBars)
                .with_frame(Rect::new(0, 0, 1080, 80))
                .with_visible(visible)],
        )
    }

    async fn wait_until_idle(handle: &InsetsActorHandle) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.running_animations().await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let handle = spawn_actor(true);
        assert!(handle.is_alive());

        handle.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.is_alive() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_actor_reflects_pushed_state() {
        let handle = spawn_actor(true);
        handle.on_state_changed(status_bar_state(false)).await.unwrap();

        let state = handle.state().await.unwrap();
        assert!(!state.source_or_default_visibility(InsetType::StatusBars));
        assert!(!handle.has_pending_ime_request().await.unwrap());
    }

    #[tokio::test]
    async fn test_actor_runs_default_animations_in_process() {
        let handle = spawn_actor(true);
        handle.on_frame_changed(DISPLAY).await.unwrap();
        handle.on_state_changed(status_bar_state(false)).await.unwrap();
        // The status bar is requested visible by default, so the grant
        // starts a show animation.
        handle.on_controls_changed(vec![ControlGrant::new(InsetType::StatusBars, 1)]).await.unwrap();
        wait_until_idle(&handle).await;
        assert!(handle.state().await.unwrap().source_or_default_visibility(InsetType::StatusBars));

        handle.hide(InsetTypes::STATUS_BARS).await.unwrap();
        wait_until_idle(&handle).await;
        assert!(!handle.state().await.unwrap().source_or_default_visibility(InsetType::StatusBars));
        assert!(!handle.is_requested_visible(InsetType::StatusBars).await.unwrap());
    }

    #[tokio::test]
    async fn test_actor_runs_default_animations_off_thread() {
        let handle = spawn_actor(false);
        handle.on_frame_changed(DISPLAY).await.unwrap();
        handle.on_state_changed(status_bar_state(true)).await.unwrap();
        handle.on_controls_changed(vec![ControlGrant::new(InsetType::StatusBars, 1)]).await.unwrap();

        handle.hide(InsetTypes::STATUS_BARS).await.unwrap();
        wait_until_idle(&handle).await;
        let requested = handle.requested_state().await.unwrap();
        assert!(!requested.source_or_default_visibility(InsetType::StatusBars));
    }

    #[tokio::test]
    async fn test_actor_registers_controllable_listener() {
        let handle = spawn_actor(true);
        handle.on_frame_changed(DISPLAY).await.unwrap();
        handle.on_state_changed(status_bar_state(true)).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |_: &mut InsetsController, types: InsetTypes| sink.lock().push(types);
        handle.add_controllable_listener(Box::new(listener)).await.unwrap();
        handle.on_controls_changed(vec![ControlGrant::new(InsetType::StatusBars, 1)]).await.unwrap();
        assert_eq!(handle.controllable_types().await.unwrap(), InsetTypes::STATUS_BARS);

        let seen = seen.lock().clone();
        assert_eq!(seen.first(), Some(&InsetTypes::empty()));
        assert_eq!(seen.last(), Some(&InsetTypes::STATUS_BARS));
    }
}
