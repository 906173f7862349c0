//! `chimera-stim` library: a transmit-only CAN stimulus sequencer for bench
//! testing a motor/battery controller in a `no_std` environment. The crate exposes
//! the transport primitives (CAN identifiers, frames, driver and timer seams), the
//! device message helpers, and the sequence engine (plan, runner, supervisor).
#![no_std]
//==================================================================================
#[macro_use]
mod fmt;
//==================================================================================
/// Error types for frame construction, configuration, and run supervision.
pub mod error;
/// CAN transport, device messages, and the scripted test-sequence engine.
pub mod protocol;
//==================================================================================
pub use error::{ConfigError, FrameBuildError, RunFailure, StartError};
pub use protocol::sequence::{
    build_plan,
    cancel::CancelToken,
    plan::{Phase, Plan, Step, PLAN_LEN},
    progress::{ChannelSink, NullSink, Progress, ProgressSink, SignalSink},
    runner::{run_plan, RunOutcome},
    supervisor::{RunHandle, RunState, RunSupervisor, RunWorker},
};
pub use protocol::transport::{
    can_frame::CanFrame,
    can_id::CanId,
    channel_config::{Bitrate, ChannelConfig},
    traits::{
        can_driver::CanDriver,
        step_timer::{EmbassyTimer, StepTimer},
    },
};
//==================================================================================
