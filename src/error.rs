//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame construction, channel
//! configuration, run start, run failure).
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while building a CAN identifier or frame.
pub enum FrameBuildError {
    /// Identifier does not fit the 11-bit (standard) or 29-bit (extended) range.
    #[error("Identifier {id:#X} exceeds the {max:#X} limit")]
    IdOutOfRange { id: u32, max: u32 },
    /// Classic CAN carries at most eight payload bytes.
    #[error("Payload too long: {len} bytes (max 8)")]
    PayloadTooLong { len: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Invalid channel configuration.
pub enum ConfigError {
    /// The adapter has no timing preset for the requested bitrate.
    #[error("Unsupported bitrate: {bits_per_second} bit/s")]
    UnsupportedBitrate { bits_per_second: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Rejections returned by [`RunSupervisor::start`](crate::RunSupervisor::start).
pub enum StartError {
    /// Another run currently owns the CAN channel.
    #[error("A test run is already in progress")]
    AlreadyRunning,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Fatal conditions that end a run. Cancellation is not a failure and is reported
/// through [`RunOutcome::Cancelled`](crate::RunOutcome::Cancelled) instead.
pub enum RunFailure<E: core::fmt::Debug> {
    /// The CAN channel could not be opened; no frame was sent.
    #[error("CAN channel failed to open: {0:?}")]
    Init(E),
    /// The driver rejected a frame; the remaining steps were abandoned.
    #[error("Transmit failed at step {step_index}: {error:?}")]
    Transmit { step_index: usize, error: E },
}

impl<E: core::fmt::Debug> RunFailure<E> {
    /// Driver error carried by the failure.
    pub fn driver_error(&self) -> &E {
        match self {
            RunFailure::Init(error) => error,
            RunFailure::Transmit { error, .. } => error,
        }
    }

    /// Index of the failing step, when the failure happened mid-plan.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            RunFailure::Init(_) => None,
            RunFailure::Transmit { step_index, .. } => Some(*step_index),
        }
    }
}
