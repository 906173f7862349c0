//! Progress reporting between the runner and whoever watches the run.
//!
//! The runner calls [`ProgressSink::on_progress`] from the worker's context, which
//! may be another thread or task than the one rendering it. Sinks must return
//! promptly: the call sits inside the timed step loop.

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::{Channel, Sender},
    signal::Signal,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// `completed` steps out of `total`.
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub const fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Whole percentage, 0 to 100. An empty plan counts as 100 %.
    pub const fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let completed = if self.completed > self.total {
            self.total
        } else {
            self.completed
        };
        // u128 keeps `completed * 100` from overflowing on 32-bit targets.
        ((completed as u128 * 100) / self.total as u128) as u8
    }

    pub const fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Steps still to go.
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

//==================================================================================SINK
/// Observer notified after each completed step.
pub trait ProgressSink {
    /// Step finished: frame sent and its delay observed.
    fn on_progress(&mut self, progress: Progress);

    /// Frame of step `progress.completed` accepted by the driver, before its delay.
    fn on_transmitted(&mut self, _progress: Progress) {}
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn on_progress(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Sink that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&mut self, _progress: Progress) {}
}

/// Latest-value sink: each notification overwrites the previous one, so a slow
/// reader only ever sees the freshest progress and the runner never waits.
pub struct SignalSink<'a, M: RawMutex> {
    signal: &'a Signal<M, Progress>,
}

impl<'a, M: RawMutex> SignalSink<'a, M> {
    pub fn new(signal: &'a Signal<M, Progress>) -> Self {
        Self { signal }
    }
}

impl<M: RawMutex> ProgressSink for SignalSink<'_, M> {
    fn on_progress(&mut self, progress: Progress) {
        self.signal.signal(progress);
    }
}

/// Queueing sink backed by a bounded [`Channel`]. Notifications that find the
/// queue full are dropped and counted rather than blocking the runner.
pub struct ChannelSink<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, Progress, N>,
    dropped: usize,
}

impl<'a, M: RawMutex, const N: usize> ChannelSink<'a, M, N> {
    pub fn new(channel: &'a Channel<M, Progress, N>) -> Self {
        Self {
            sender: channel.sender(),
            dropped: 0,
        }
    }

    /// Notifications lost to a full queue so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<M: RawMutex, const N: usize> ProgressSink for ChannelSink<'_, M, N> {
    fn on_progress(&mut self, progress: Progress) {
        if self.sender.try_send(progress).is_err() {
            self.dropped += 1;
            trace!("Progress queue full, dropped {}/{}", progress.completed, progress.total);
        }
    }
}
