//! Creation and inspection of CAN identifiers, in both the 11-bit standard and
//! the 29-bit extended formats.
use crate::error::FrameBuildError;
use crate::protocol::transport::{EXTENDED_ID_MAX, STANDARD_ID_MAX};
use embedded_can::{ExtendedId, Id, StandardId};

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Range-checked CAN identifier. The format (standard or extended) travels with
/// the value so the driver can pick the matching message type.
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    /// Builds an 11-bit identifier; fails above `0x7FF`.
    pub const fn standard(raw: u16) -> Result<Self, FrameBuildError> {
        if raw as u32 > STANDARD_ID_MAX {
            return Err(FrameBuildError::IdOutOfRange {
                id: raw as u32,
                max: STANDARD_ID_MAX,
            });
        }
        Ok(Self {
            raw: raw as u32,
            extended: false,
        })
    }

    /// Builds a 29-bit identifier; fails above `0x1FFF_FFFF`.
    pub const fn extended(raw: u32) -> Result<Self, FrameBuildError> {
        if raw > EXTENDED_ID_MAX {
            return Err(FrameBuildError::IdOutOfRange {
                id: raw,
                max: EXTENDED_ID_MAX,
            });
        }
        Ok(Self {
            raw,
            extended: true,
        })
    }

    /// Numeric identifier value.
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// `true` for 29-bit identifiers.
    pub const fn is_extended(&self) -> bool {
        self.extended
    }
}

//==================================================================================EMBEDDED_CAN
impl From<CanId> for Id {
    fn from(id: CanId) -> Self {
        // Both constructors below only fail out of range, which `CanId` already rules out.
        if id.extended {
            Id::Extended(ExtendedId::new(id.raw).unwrap_or(ExtendedId::ZERO))
        } else {
            Id::Standard(StandardId::new(id.raw as u16).unwrap_or(StandardId::ZERO))
        }
    }
}

impl From<Id> for CanId {
    fn from(id: Id) -> Self {
        match id {
            Id::Standard(id) => Self {
                raw: id.as_raw() as u32,
                extended: false,
            },
            Id::Extended(id) => Self {
                raw: id.as_raw(),
                extended: true,
            },
        }
    }
}
