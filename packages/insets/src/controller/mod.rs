//! The inset animation controller.
//!
//! [`InsetsController`] is the orchestrator. It owns the snapshot store, one
//! consumer per inset type, the running animations, the parked keyboard
//! request and the owner task queue. Every public operation is expected to
//! run on a single owner (see [`crate::actor`] for a tokio event loop that
//! provides one).
//!
//! The implementation is split by concern:
//! - `control`: show/hide and user-driven animation entry points
//! - `reconcile`: state pushes, control grants and listener bookkeeping
//! - `frame`: animation drivers, frame ticks and start/progress dispatch

mod control;
mod frame;
mod reconcile;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::animation::evaluator::InsetsAnimator;
use crate::animation::off_thread::OffThreadDriver;
use crate::animation::{
    AnimationControlListener, AnimationId, AnimationRunner, ControllableInsetsListener,
    InsetsAnimation,
};
use crate::cancellation::CancellationSignal;
use crate::config::ControllerConfig;
use crate::consumer::ConsumerSet;
use crate::host::{Host, InputMethodService};
use crate::scheduler::{Clock, OwnerEvent, SystemClock, TaskQueue};
use crate::state::{InsetsState, SnapshotStore};
use crate::types::{AnimationKind, InsetType, InsetTypes, Rect};

pub(crate) use control::PendingControlRequest;

/// Identifier of a registered controllable-insets listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// ============================================================================
// Running Animations
// ============================================================================

/// What advances an animation's frames.
enum Driver {
    /// Sampled on the owner at each animation frame.
    InProcess { animator: InsetsAnimator, started_at: Instant },
    /// Sampled on a secondary thread that posts frames to the owner queue.
    /// Dropping the handle stops the thread.
    OffThread { _handle: OffThreadDriver },
}

struct RunningEntry {
    runner: AnimationRunner,
    start_dispatched: bool,
    driver: Option<Driver>,
    cancellation: Option<CancellationSignal>,
}

impl RunningEntry {
    const fn new(runner: AnimationRunner, cancellation: Option<CancellationSignal>) -> Self {
        Self { runner, start_dispatched: false, driver: None, cancellation }
    }

    const fn has_in_process_driver(&self) -> bool {
        matches!(self.driver, Some(Driver::InProcess { .. }))
    }

    /// Stops the driver and detaches the caller's cancellation hook.
    fn stop(&mut self) {
        self.driver = None;
        if let Some(signal) = &self.cancellation {
            signal.clear_on_cancel();
        }
    }
}

/// A listener callback waiting to be delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListenerCall {
    Ready(InsetTypes),
    Finished,
    Cancelled(Option<AnimationId>),
}

// ============================================================================
// Controller
// ============================================================================

/// Coordinates show, hide and user-driven inset animations.
pub struct InsetsController {
    host: Box<dyn Host>,
    ime: Box<dyn InputMethodService>,
    config: ControllerConfig,
    clock: Arc<dyn Clock>,

    store: SnapshotStore,
    consumers: ConsumerSet,
    frame: Rect,

    runners: Vec<RunningEntry>,
    pending: Option<PendingControlRequest>,
    tasks: TaskQueue,
    events_tx: UnboundedSender<OwnerEvent>,
    events_rx: Option<UnboundedReceiver<OwnerEvent>>,

    controllable_listeners: Vec<(ListenerId, Box<dyn ControllableInsetsListener>)>,
    removed_listeners: Vec<ListenerId>,
    listener_mailbox: Vec<(AnimationId, ListenerCall)>,

    types_being_cancelled: InsetTypes,
    last_started_anim_types: InsetTypes,
    disabled_user_animation_types: InsetTypes,
    caption_insets_height: i32,
    animations_disabled: bool,
    starting_animation: bool,
    anim_callback_scheduled: bool,
    in_animation_frame: bool,

    next_animation_id: u64,
    next_request_id: u64,
    next_listener_id: u64,
}

impl InsetsController {
    /// Creates a controller driven by the wall clock.
    #[must_use]
    pub fn new(
        host: Box<dyn Host>,
        ime: Box<dyn InputMethodService>,
        config: ControllerConfig,
    ) -> Self {
        let config = config.sanitized();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            host,
            ime,
            animations_disabled: config.animations_disabled,
            config,
            clock: Arc::new(SystemClock),
            store: SnapshotStore::new(),
            consumers: ConsumerSet::default(),
            frame: Rect::default(),
            runners: Vec::new(),
            pending: None,
            tasks: TaskQueue::new(),
            events_tx,
            events_rx: Some(events_rx),
            controllable_listeners: Vec::new(),
            removed_listeners: Vec::new(),
            listener_mailbox: Vec::new(),
            types_being_cancelled: InsetTypes::empty(),
            last_started_anim_types: InsetTypes::empty(),
            disabled_user_animation_types: InsetTypes::empty(),
            caption_insets_height: 0,
            starting_animation: false,
            anim_callback_scheduled: false,
            in_animation_frame: false,
            next_animation_id: 1,
            next_request_id: 1,
            next_listener_id: 1,
        }
    }

    /// Replaces the clock used for timers and in-process animations.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The live snapshot.
    #[must_use]
    pub const fn state(&self) -> &InsetsState { self.store.local() }

    /// The last snapshot pushed by the remote authority.
    #[must_use]
    pub const fn last_dispatched_state(&self) -> &InsetsState { self.store.last_dispatched() }

    /// The last snapshot sent to the remote authority.
    #[must_use]
    pub const fn requested_state(&self) -> &InsetsState { self.store.requested() }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig { &self.config }

    /// The window frame.
    #[must_use]
    pub const fn frame(&self) -> Rect { self.frame }

    /// Kind of the animation currently controlling `ty`, if any.
    #[must_use]
    pub fn animation_kind(&self, ty: InsetType) -> Option<AnimationKind> {
        self.runners
            .iter()
            .rev()
            .find(|entry| entry.runner.types().has(ty))
            .map(|entry| entry.runner.kind())
    }

    /// Whether `ty` is requested visible.
    #[must_use]
    pub fn is_requested_visible(&self, ty: InsetType) -> bool {
        self.consumers.get(ty).map_or_else(|| ty.default_visibility(), |c| c.is_requested_visible())
    }

    /// Whether we currently hold a control grant for `ty`.
    #[must_use]
    pub fn has_control(&self, ty: InsetType) -> bool {
        self.consumers.get(ty).is_some_and(crate::consumer::InsetsSourceConsumer::has_control)
    }

    /// Every running animation, in creation order.
    #[must_use]
    pub fn running_animations(&self) -> Vec<InsetsAnimation> {
        self.runners.iter().map(|entry| entry.runner.animation()).collect()
    }

    /// The runner of a running animation.
    #[must_use]
    pub fn runner(&self, id: AnimationId) -> Option<&AnimationRunner> {
        self.entry(id).map(|entry| &entry.runner)
    }

    /// Whether a keyboard request is parked awaiting the input method.
    #[must_use]
    pub const fn has_pending_ime_request(&self) -> bool { self.pending.is_some() }

    /// Types of the parked keyboard request.
    #[must_use]
    pub fn pending_ime_request_types(&self) -> Option<InsetTypes> {
        self.pending.as_ref().map(PendingControlRequest::types)
    }

    /// Types a user animation may currently control.
    #[must_use]
    pub fn controllable_types(&self) -> InsetTypes {
        let state = self.store.local();
        let controllable: InsetTypes = self
            .consumers
            .iter()
            .filter(|consumer| consumer.has_control())
            .filter(|consumer| {
                state.peek_source(consumer.ty()).is_some_and(crate::state::InsetsSource::is_user_controllable)
            })
            .map(crate::consumer::InsetsSourceConsumer::ty)
            .collect();
        controllable & !state.calculate_uncontrollable_types_from_frame(&self.frame)
    }

    // ========================================================================
    // Running Animation Bookkeeping
    // ========================================================================

    const fn next_animation_id(&mut self) -> AnimationId {
        let id = AnimationId::new(self.next_animation_id);
        self.next_animation_id += 1;
        id
    }

    fn entry(&self, id: AnimationId) -> Option<&RunningEntry> {
        self.runners.iter().find(|entry| entry.runner.id() == id)
    }

    fn entry_mut(&mut self, id: AnimationId) -> Option<&mut RunningEntry> {
        self.runners.iter_mut().find(|entry| entry.runner.id() == id)
    }

    fn ids_overlapping(&self, types: InsetTypes) -> Vec<AnimationId> {
        self.runners
            .iter()
            .rev()
            .filter(|entry| entry.runner.types().intersects(types))
            .map(|entry| entry.runner.id())
            .collect()
    }

    /// Delivers a listener callback.
    ///
    /// A listener that is already running a callback for this animation is
    /// absent from its runner; the call is then queued and delivered by the
    /// outer dispatch once the current callback returns.
    pub(crate) fn dispatch_listener(
        &mut self,
        id: AnimationId,
        listener: Option<Box<dyn AnimationControlListener>>,
        call: ListenerCall,
    ) {
        let Some(mut listener) = listener else {
            self.listener_mailbox.push((id, call));
            return;
        };

        let mut next = Some(call);
        while let Some(call) = next {
            match call {
                ListenerCall::Ready(types) => listener.on_ready(self, id, types),
                ListenerCall::Finished => listener.on_finished(self, id),
                ListenerCall::Cancelled(ready) => listener.on_cancelled(self, ready),
            }
            next = self
                .listener_mailbox
                .iter()
                .position(|(owner, _)| *owner == id)
                .map(|index| self.listener_mailbox.remove(index).1);
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.runner.restore_listener(listener);
        }
    }

    /// Removes a running animation.
    ///
    /// With `invoke_callback` the listener hears about the cancellation and
    /// the host gets its end callback. Consumers always get to apply frames
    /// they held back while the animation ran.
    pub(crate) fn cancel_animation(&mut self, id: AnimationId, invoke_callback: bool) {
        let Some(index) = self.runners.iter().position(|entry| entry.runner.id() == id) else {
            return;
        };
        let mut entry = self.runners.remove(index);
        entry.stop();

        if invoke_callback {
            let ready = entry.runner.is_ready();
            if entry.runner.cancel() {
                tracing::debug!(animation = %id, types = %entry.runner.types(), "animation cancelled");
                let listener = entry.runner.take_listener();
                self.dispatch_listener(id, listener, ListenerCall::Cancelled(ready.then_some(id)));
            }
        }

        let mut state_changed = false;
        for ty in entry.runner.types().internal_types() {
            state_changed |= self.consumers.get_mut(ty).notify_animation_finished(self.store.local_mut());
        }
        if invoke_callback && entry.start_dispatched {
            self.host.dispatch_animation_end(&entry.runner.animation());
        }
        if state_changed {
            self.host.notify_insets_changed();
            self.update_requested_state();
        }
    }

    /// Called when an animation applied its final frame.
    pub(crate) fn notify_finished(&mut self, id: AnimationId, shown: bool) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let types = entry.runner.types();
        let kind = entry.runner.kind();
        self.cancel_animation(id, false);
        tracing::debug!(animation = %id, types = %types, shown, "animation finished");
        if shown {
            self.show_directly(types);
        } else {
            self.hide_directly(types, true, kind);
        }
    }

    // ========================================================================
    // Direct Visibility
    // ========================================================================

    fn show_directly(&mut self, types: InsetTypes) {
        let mut changed = false;
        for ty in types.internal_types() {
            changed |= self.consumers.get_mut(ty).show(false, self.store.local_mut());
        }
        if changed {
            self.notify_visibility_changed();
        }
    }

    fn hide_directly(&mut self, types: InsetTypes, animation_finished: bool, kind: AnimationKind) {
        let mut changed = false;
        for ty in types.internal_types() {
            changed |= self.consumers.get_mut(ty).hide_after_animation(
                animation_finished,
                kind,
                self.store.local_mut(),
                self.ime.as_mut(),
            );
        }
        if changed {
            self.notify_visibility_changed();
        }
    }

    fn notify_visibility_changed(&mut self) {
        self.host.notify_insets_changed();
        self.update_requested_state();
    }

    /// Sends locally requested visibility to the authority when it diverged.
    fn update_requested_state(&mut self) {
        let controlled: InsetTypes = self
            .consumers
            .iter()
            .filter(|consumer| consumer.has_control() && consumer.ty() != InsetType::CaptionBar)
            .map(crate::consumer::InsetsSourceConsumer::ty)
            .collect();

        let mut changed = false;
        for ty in controlled.internal_types() {
            changed |= self.store.sync_requested_source(ty);
        }
        if changed {
            tracing::debug!(types = %controlled, "sending requested state");
            self.host.on_insets_modified(self.store.requested());
        }
    }
}

impl fmt::Debug for InsetsController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsetsController")
            .field("frame", &self.frame)
            .field("state", self.store.local())
            .field("running", &self.runners.iter().map(|e| &e.runner).collect::<Vec<_>>())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
