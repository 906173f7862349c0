//! High-level components of the stimulus sequencer: CAN transport primitives,
//! device message helpers, and the scripted test-sequence engine.
pub mod messages;
pub mod sequence;
pub mod transport;
