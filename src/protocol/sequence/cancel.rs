//! Cooperative cancellation flag shared between the caller and the worker.
use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};

/// Set by the caller, polled by the runner at step boundaries only. Setting it
/// never interrupts a transmit or a delay already in progress.
pub struct CancelToken<M: RawMutex> {
    requested: Mutex<M, Cell<bool>>,
}

impl<M: RawMutex> CancelToken<M> {
    pub const fn new() -> Self {
        Self {
            requested: Mutex::new(Cell::new(false)),
        }
    }

    /// Ask the current run to stop at the next step boundary.
    pub fn cancel(&self) {
        self.requested.lock(|requested| requested.set(true));
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.lock(|requested| requested.get())
    }

    /// Clear a previous request before a new run starts.
    pub(crate) fn reset(&self) {
        self.requested.lock(|requested| requested.set(false));
    }
}

impl<M: RawMutex> Default for CancelToken<M> {
    fn default() -> Self {
        Self::new()
    }
}
