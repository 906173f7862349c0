//! Scripted test-sequence engine: the static plan of frames, the runner that
//! paces it onto the bus, and the supervisor owning the channel lifecycle.
//!
//! ## Timing constants
//!
//! The delays model how long the device under test needs to react to each stimulus.
//! They elapse in full after every frame, even though no bus work happens meanwhile.

pub mod cancel;
pub mod plan;
pub mod progress;
pub mod runner;
pub mod supervisor;

/// Pause after every speed frame (ms).
pub const SPEED_STEP_DELAY_MS: u32 = 200;

/// Pause after every state-of-charge frame (ms).
pub const CHARGE_STEP_DELAY_MS: u32 = 500;

/// Pause after every final command frame (ms).
///
/// Also the worst-case cancellation latency: cancellation is only observed at step
/// boundaries.
pub const COMMAND_STEP_DELAY_MS: u32 = 5_000;

/// Build the diagnostic plan. Pure: every call returns the same steps.
pub fn build_plan() -> plan::Plan {
    plan::Plan::build()
}
