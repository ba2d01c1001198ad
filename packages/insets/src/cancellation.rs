//! Caller-held cancellation hook.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type CancelCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    on_cancel: Mutex<Option<CancelCallback>>,
}

/// A cloneable signal the caller uses to cancel an animation request.
///
/// The controller registers a callback that posts the cancellation onto its
/// owner queue, so cancelling from any thread is safe and never re-enters
/// the controller.
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Cancels the signal. Only the first call runs the callback.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callback = self.inner.on_cancel.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.inner.cancelled.load(Ordering::Acquire) }

    /// Registers the callback run on cancellation, replacing any previous one.
    ///
    /// If the signal is already cancelled the callback runs immediately.
    pub fn set_on_cancel<F>(&self, callback: F)
    where F: FnOnce() + Send + 'static {
        if self.is_cancelled() {
            callback();
            return;
        }
        *self.inner.on_cancel.lock() = Some(Box::new(callback));
        // Lost a race with `cancel`: the callback is still in the slot.
        if self.is_cancelled()
            && let Some(callback) = self.inner.on_cancel.lock().take()
        {
            callback();
        }
    }

    /// Drops the registered callback.
    pub fn clear_on_cancel(&self) { self.inner.on_cancel.lock().take(); }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal").field("cancelled", &self.is_cancelled()).finish()
    }
}
