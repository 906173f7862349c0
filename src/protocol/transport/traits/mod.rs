//! Abstraction traits used by the sequence engine (CAN driver and step timer).
pub mod can_driver;
pub mod step_timer;
