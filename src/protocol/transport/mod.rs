//! CAN transport layer: identifier and frame representations, channel
//! configuration, and the driver/timer abstraction traits.
//!
//! The sequencer is transmit-only. Nothing in this layer reads from the bus.

pub mod can_frame;
pub mod can_id;
pub mod channel_config;
pub mod traits;

/// Classic CAN payload capacity (bytes).
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Highest identifier representable in an 11-bit standard frame.
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Highest identifier representable in a 29-bit extended frame.
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;
