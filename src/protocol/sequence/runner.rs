//! Sequence runner: pushes a plan onto an open channel, one step at a time,
//! in plan order.
//!
//! Per step:
//! 1. stop with [`RunOutcome::Cancelled`] if cancellation was requested;
//! 2. transmit the frame, or stop with [`RunFailure::Transmit`] on the first driver error
//!    (no retry: a lost frame breaks the timing of everything after it);
//!    and tell the sink the frame went out;
//! 3. stop with [`RunOutcome::Cancelled`] if cancellation arrived during the transmit;
//! 4. wait the step delay in full;
//! 5. report `(completed, total)` to the sink.
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::error::RunFailure;
use crate::protocol::sequence::{
    cancel::CancelToken,
    plan::Step,
    progress::{Progress, ProgressSink},
};
use crate::protocol::transport::traits::{can_driver::CanDriver, step_timer::StepTimer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Non-failing ends of a run.
pub enum RunOutcome {
    /// Every step was sent and its delay observed.
    Completed(Progress),
    /// Stopped on request; `completed` counts the frames actually sent.
    Cancelled(Progress),
}

impl RunOutcome {
    pub fn progress(&self) -> Progress {
        match self {
            RunOutcome::Completed(progress) | RunOutcome::Cancelled(progress) => *progress,
        }
    }
}

/// Run `plan` on an already open `channel`.
///
/// The channel is left open: closing it belongs to whoever opened it.
pub async fn run_plan<D, T, S, M>(
    plan: &[Step],
    driver: &mut D,
    channel: &mut D::Channel,
    timer: &mut T,
    sink: &mut S,
    cancel: &CancelToken<M>,
) -> Result<RunOutcome, RunFailure<D::Error>>
where
    D: CanDriver,
    T: StepTimer,
    S: ProgressSink,
    M: RawMutex,
{
    let total = plan.len();

    for (index, step) in plan.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Cancelled before step {}/{}", index + 1, total);
            return Ok(RunOutcome::Cancelled(Progress::new(index, total)));
        }

        if let Err(error) = driver.transmit(channel, &step.frame).await {
            error!("Transmit failed at step {}/{}", index + 1, total);
            return Err(RunFailure::Transmit {
                step_index: index,
                error,
            });
        }
        trace!(
            "Sent step {}/{}: id={:#X} data[0]={} data[1]={}",
            index + 1,
            total,
            step.frame.can_id().raw(),
            step.frame.raw_data()[0],
            step.frame.raw_data()[1]
        );

        let progress = Progress::new(index + 1, total);
        sink.on_transmitted(progress);
        if cancel.is_cancelled() {
            info!("Cancelled after step {}/{}", index + 1, total);
            return Ok(RunOutcome::Cancelled(progress));
        }

        timer.delay_ms(step.delay_ms).await;
        sink.on_progress(progress);
    }

    debug!("Plan finished: {} steps", total);
    Ok(RunOutcome::Completed(Progress::new(total, total)))
}
