//! Inset animation controller.
//!
//! Coordinates how system bars and the on-screen keyboard appear and
//! disappear in a window. Visibility is negotiated with a remote window
//! authority that pushes state snapshots and control grants; while a grant
//! is held, show and hide transitions are animated locally, either by the
//! built-in default animation or frame by frame by a caller.
//!
//! [`InsetsController`] holds all of the logic and expects a single owner.
//! [`InsetsActor`] provides one on a tokio task.

pub mod actor;
pub mod animation;
pub mod cancellation;
pub mod config;
pub mod consumer;
pub mod controller;
pub mod error;
pub mod host;
pub mod logging;
pub mod scheduler;
pub mod state;
pub mod types;

pub use actor::{InsetsActor, InsetsActorHandle, InsetsMessage, InsetsQuery, QueryResult};
pub use animation::{
    AnimationBounds, AnimationControlListener, AnimationId, ControllableInsetsListener,
    DefaultAnimationListener, InsetsAnimation, InsetsAnimator, Interpolator,
};
pub use cancellation::CancellationSignal;
pub use config::{ConfigError, ControllerConfig};
pub use consumer::ControlGrant;
pub use controller::{InsetsController, ListenerId};
pub use error::{InsetsError, InsetsResult};
pub use host::{Host, InputMethodService, NoInputMethod};
pub use scheduler::{Clock, ManualClock, SystemClock};
pub use state::{InsetsSource, InsetsState};
pub use types::{AnimationKind, InsetSide, InsetType, InsetTypes, Insets, LayoutDuringAnimation, Rect};
