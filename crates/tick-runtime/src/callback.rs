//! Tick callbacks and the handles that identify them in a registry.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tick_common::error::{CallbackId, TickError, TickResult};

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Work executed once per tick.
///
/// Implemented for every `FnMut() -> anyhow::Result<()>` closure; implement it
/// directly for callbacks that carry their own state.
pub trait TickCallback: Send {
    /// Run one tick's worth of work.
    ///
    /// # Errors
    ///
    /// Any error is reported for this callback only; the rest of the tick
    /// still runs.
    fn on_tick(&mut self) -> anyhow::Result<()>;
}

impl<F> TickCallback for F
where
    F: FnMut() -> anyhow::Result<()> + Send,
{
    fn on_tick(&mut self) -> anyhow::Result<()> {
        self()
    }
}

/// Shareable handle to a tick callback.
///
/// Clones refer to the same callback and compare equal. Registering the
/// same handle twice makes it run twice per tick.
#[derive(Clone)]
pub struct CallbackHandle {
    id: CallbackId,
    callback: Arc<Mutex<Box<dyn TickCallback>>>,
}

impl CallbackHandle {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self::from_callback(f)
    }

    /// Wrap any [`TickCallback`] implementation.
    pub fn from_callback<C>(callback: C) -> Self
    where
        C: TickCallback + 'static,
    {
        Self::with_id(next_callback_id(), callback)
    }

    pub(crate) fn with_id<C>(id: CallbackId, callback: C) -> Self
    where
        C: TickCallback + 'static,
    {
        Self {
            id,
            callback: Arc::new(Mutex::new(Box::new(callback))),
        }
    }

    /// Identity of this callback.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Run the callback, isolating errors and panics.
    ///
    /// # Errors
    ///
    /// [`TickError::CallbackFailed`] if the callback returned an error,
    /// [`TickError::CallbackPanicked`] if it panicked.
    pub fn invoke(&self) -> TickResult<()> {
        let mut callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match panic::catch_unwind(AssertUnwindSafe(|| callback.on_tick())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TickError::CallbackFailed {
                id: self.id,
                reason: format!("{e:#}"),
            }),
            Err(payload) => Err(TickError::CallbackPanicked {
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl PartialEq for CallbackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CallbackHandle {}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackHandle").field(&self.id).finish()
    }
}

pub(crate) fn next_callback_id() -> CallbackId {
    CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
