//! The diagnostic plan: an ordered, fully static list of steps, each one a frame
//! plus the delay to observe after sending it.
//!
//! The order is part of the stimulus. The device under test must observe the ramps
//! in sequence, so nothing downstream may reorder or skip steps.
//!
//! | Phase            | Id      | Values                   | Delay   | Steps |
//! |------------------|---------|--------------------------|---------|-------|
//! | `SpeedUp`        | `0x607` | 1, 2, ..., 100           | 200 ms  | 100   |
//! | `SpeedDown`      | `0x607` | 100, 99, ..., 0          | 200 ms  | 101   |
//! | `ChargeUp`       | `0x602` | 100, 150, ..., 1000      | 500 ms  | 19    |
//! | `ChargeDown`     | `0x602` | 1001, 951, ..., 151      | 500 ms  | 18    |
//! | `FinalCommands`  | `0x607` | 1, 18, 20, 17, 34, 66, 17 | 5000 ms | 7     |
use core::ops::{Deref, Range};

use crate::protocol::messages::{
    discrete_command, speed_command, state_of_charge, FINAL_COMMAND_CODES,
};
use crate::protocol::sequence::{
    CHARGE_STEP_DELAY_MS, COMMAND_STEP_DELAY_MS, SPEED_STEP_DELAY_MS,
};
use crate::protocol::transport::can_frame::CanFrame;

/// Top speed reached by the speed ramp.
pub const SPEED_RAMP_PEAK: u8 = 100;
/// First state-of-charge value of the upward ramp.
pub const CHARGE_UP_FIRST: u16 = 100;
/// Last state-of-charge value of the upward ramp.
pub const CHARGE_UP_LAST: u16 = 1000;
/// First state-of-charge value of the downward ramp. One above `CHARGE_UP_LAST`,
/// as the bench script has always sent it.
pub const CHARGE_DOWN_FIRST: u16 = 1001;
/// Last state-of-charge value of the downward ramp.
pub const CHARGE_DOWN_LAST: u16 = 151;
/// Increment between two state-of-charge frames.
pub const CHARGE_STEP: u16 = 50;

/// Number of steps in the diagnostic plan; also the progress denominator.
pub const PLAN_LEN: usize = Phase::SpeedUp.step_count()
    + Phase::SpeedDown.step_count()
    + Phase::ChargeUp.step_count()
    + Phase::ChargeDown.step_count()
    + Phase::FinalCommands.step_count();

//==================================================================================PHASE
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Section of the plan a step belongs to. Informational only.
pub enum Phase {
    SpeedUp,
    SpeedDown,
    ChargeUp,
    ChargeDown,
    FinalCommands,
}

impl Phase {
    /// Phases in plan order.
    pub const ALL: [Phase; 5] = [
        Phase::SpeedUp,
        Phase::SpeedDown,
        Phase::ChargeUp,
        Phase::ChargeDown,
        Phase::FinalCommands,
    ];

    pub const fn step_count(&self) -> usize {
        match self {
            Phase::SpeedUp => SPEED_RAMP_PEAK as usize,
            Phase::SpeedDown => SPEED_RAMP_PEAK as usize + 1,
            Phase::ChargeUp => ((CHARGE_UP_LAST - CHARGE_UP_FIRST) / CHARGE_STEP) as usize + 1,
            Phase::ChargeDown => {
                ((CHARGE_DOWN_FIRST - CHARGE_DOWN_LAST) / CHARGE_STEP) as usize + 1
            }
            Phase::FinalCommands => FINAL_COMMAND_CODES.len(),
        }
    }

    /// Delay observed after each frame of the phase.
    pub const fn delay_ms(&self) -> u32 {
        match self {
            Phase::SpeedUp | Phase::SpeedDown => SPEED_STEP_DELAY_MS,
            Phase::ChargeUp | Phase::ChargeDown => CHARGE_STEP_DELAY_MS,
            Phase::FinalCommands => COMMAND_STEP_DELAY_MS,
        }
    }

    /// Position of the phase's steps inside the plan.
    pub const fn span(&self) -> Range<usize> {
        let mut start = 0;
        let mut i = 0;
        while i < Self::ALL.len() {
            if Self::ALL[i] as u8 == *self as u8 {
                break;
            }
            start += Self::ALL[i].step_count();
            i += 1;
        }
        start..start + self.step_count()
    }
}

//==================================================================================STEP
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One frame of the plan and the pause that follows it.
pub struct Step {
    pub frame: CanFrame,
    /// Wait after transmitting `frame`, in milliseconds.
    pub delay_ms: u32,
    pub phase: Phase,
}

impl Step {
    pub const fn new(frame: CanFrame, delay_ms: u32, phase: Phase) -> Self {
        Self {
            frame,
            delay_ms,
            phase,
        }
    }

    const fn in_phase(frame: CanFrame, phase: Phase) -> Self {
        Self::new(frame, phase.delay_ms(), phase)
    }
}

/// Sum of the delays of `steps`, in milliseconds.
pub fn total_delay_ms(steps: &[Step]) -> u64 {
    steps.iter().map(|step| step.delay_ms as u64).sum()
}

//==================================================================================PLAN
#[derive(Clone, Debug, PartialEq, Eq)]
/// The complete diagnostic script. Dereferences to `[Step]`.
pub struct Plan {
    steps: [Step; PLAN_LEN],
}

impl Plan {
    /// Generate every phase in order. Deterministic and usable in `const` contexts.
    pub const fn build() -> Self {
        let mut steps = [Step::in_phase(speed_command(0), Phase::SpeedUp); PLAN_LEN];
        let mut index = 0;

        // Speed 1..=100
        let mut speed = 1u8;
        while speed <= SPEED_RAMP_PEAK {
            steps[index] = Step::in_phase(speed_command(speed), Phase::SpeedUp);
            index += 1;
            speed += 1;
        }

        // Speed 100 down to 0
        let mut k = 1u8;
        while k <= SPEED_RAMP_PEAK + 1 {
            steps[index] = Step::in_phase(speed_command(SPEED_RAMP_PEAK + 1 - k), Phase::SpeedDown);
            index += 1;
            k += 1;
        }

        let mut soc = CHARGE_UP_FIRST;
        while soc <= CHARGE_UP_LAST {
            steps[index] = Step::in_phase(state_of_charge(soc), Phase::ChargeUp);
            index += 1;
            soc += CHARGE_STEP;
        }

        let mut soc = CHARGE_DOWN_FIRST;
        while soc >= CHARGE_DOWN_LAST {
            steps[index] = Step::in_phase(state_of_charge(soc), Phase::ChargeDown);
            index += 1;
            soc -= CHARGE_STEP;
        }

        let mut c = 0;
        while c < FINAL_COMMAND_CODES.len() {
            steps[index] = Step::in_phase(
                discrete_command(FINAL_COMMAND_CODES[c]),
                Phase::FinalCommands,
            );
            index += 1;
            c += 1;
        }

        assert!(index == PLAN_LEN);
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps belonging to `phase`, in order.
    pub fn phase_steps(&self, phase: Phase) -> &[Step] {
        &self.steps[phase.span()]
    }

    /// Phase of the step at `index`, if any.
    pub fn phase_at(&self, index: usize) -> Option<Phase> {
        self.steps.get(index).map(|step| step.phase)
    }

    /// Sum of every step delay: the nominal duration of a full run.
    pub fn total_delay_ms(&self) -> u64 {
        total_delay_ms(&self.steps)
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::build()
    }
}

impl Deref for Plan {
    type Target = [Step];

    fn deref(&self) -> &Self::Target {
        &self.steps
    }
}

impl AsRef<[Step]> for Plan {
    fn as_ref(&self) -> &[Step] {
        &self.steps
    }
}
