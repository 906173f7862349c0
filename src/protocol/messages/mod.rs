//! Messages understood by the device under test. All of them are eight-byte
//! standard frames:
//!
//! | Identifier | Meaning          | Layout                                               |
//! |------------|------------------|------------------------------------------------------|
//! | `0x607`    | speed            | byte 1 = speed, every other byte `0x01`              |
//! | `0x607`    | discrete command | byte 0 = command code, every other byte `0x00`       |
//! | `0x602`    | state of charge  | bytes 0..2 = big-endian value, every other byte `0x00` |
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId};

/// Speed / command message identifier.
pub const SPEED_COMMAND_ID: CanId = match CanId::standard(0x607) {
    Ok(id) => id,
    Err(_) => panic!("0x607 is a valid standard identifier"),
};

/// State-of-charge message identifier.
pub const STATE_OF_CHARGE_ID: CanId = match CanId::standard(0x602) {
    Ok(id) => id,
    Err(_) => panic!("0x602 is a valid standard identifier"),
};

/// Filler used for every speed-frame byte except the speed itself.
pub const SPEED_FILL_BYTE: u8 = 0x01;

/// Command codes sent, in order, at the end of the diagnostic sequence.
pub const FINAL_COMMAND_CODES: [u8; 7] = [1, 18, 20, 17, 34, 66, 17];

/// Speed frame: `speed` in byte 1.
pub const fn speed_command(speed: u8) -> CanFrame {
    let mut data = [SPEED_FILL_BYTE; 8];
    data[1] = speed;
    CanFrame::from_array(SPEED_COMMAND_ID, data)
}

/// State-of-charge frame: high byte first.
pub const fn state_of_charge(value: u16) -> CanFrame {
    let bytes = value.to_be_bytes();
    let mut data = [0u8; 8];
    data[0] = bytes[0];
    data[1] = bytes[1];
    CanFrame::from_array(STATE_OF_CHARGE_ID, data)
}

/// Discrete command frame: `code` in byte 0.
pub const fn discrete_command(code: u8) -> CanFrame {
    let mut data = [0u8; 8];
    data[0] = code;
    CanFrame::from_array(SPEED_COMMAND_ID, data)
}

/// Reads back the state-of-charge value carried by a `0x602` frame.
pub fn decode_state_of_charge(frame: &CanFrame) -> Option<u16> {
    if frame.can_id() != STATE_OF_CHARGE_ID || frame.len() < 2 {
        return None;
    }
    let data = frame.raw_data();
    Some(u16::from_be_bytes([data[0], data[1]]))
}
