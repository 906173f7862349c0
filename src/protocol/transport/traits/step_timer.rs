//! Asynchronous timer abstraction pacing the sequence between two frames.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait StepTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`StepTimer`] backed by `embassy-time`. Requires an embassy time driver
/// (the chip HAL's, or `embassy-time/std` on a host).
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyTimer;

impl StepTimer for EmbassyTimer {
    async fn delay_ms(&mut self, millis: u32) {
        embassy_time::Timer::after_millis(millis as u64).await;
    }
}
