//! One-shot callbacks that fire after a number of ticks.

use crate::callback::TickCallback;
use crate::driver::WeakTickDriver;
use tick_common::error::CallbackId;
use tracing::debug;

/// Action run once when a deferred callback comes due.
pub type DeferredAction = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Registry entry that waits `target` ticks, then unregisters itself and
/// runs its action once.
pub(crate) struct DeferredCallback {
    id: CallbackId,
    elapsed: u64,
    target: u64,
    action: Option<DeferredAction>,
    driver: WeakTickDriver,
}

impl DeferredCallback {
    pub(crate) fn new(
        id: CallbackId,
        target: u64,
        action: DeferredAction,
        driver: WeakTickDriver,
    ) -> Self {
        Self {
            id,
            elapsed: 0,
            target,
            action: Some(action),
            driver,
        }
    }
}

impl TickCallback for DeferredCallback {
    fn on_tick(&mut self) -> anyhow::Result<()> {
        if self.elapsed < self.target {
            self.elapsed += 1;
            return Ok(());
        }

        if let Some(driver) = self.driver.upgrade() {
            driver.unregister_id(self.id);
        }

        match self.action.take() {
            Some(action) => {
                debug!(callback = %self.id, after_ticks = self.target, "Deferred callback due");
                action()
            }
            None => Ok(()),
        }
    }
}
