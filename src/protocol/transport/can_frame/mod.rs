//! In-memory representation of a classic CAN data frame as handed to the driver.
use crate::error::FrameBuildError;
use crate::protocol::transport::{can_id::CanId, MAX_PAYLOAD_LEN};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Classic CAN data frame. Immutable once built: the payload buffer always holds
/// eight bytes, with everything past `len` zero-filled.
pub struct CanFrame {
    id: CanId,
    data: [u8; MAX_PAYLOAD_LEN],
    len: usize,
}

impl CanFrame {
    /// Encode `bytes` under `id`, zero-padding the payload to eight bytes.
    pub fn encode(id: CanId, bytes: &[u8]) -> Result<Self, FrameBuildError> {
        if bytes.len() > MAX_PAYLOAD_LEN {
            return Err(FrameBuildError::PayloadTooLong { len: bytes.len() });
        }
        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            id,
            data,
            len: bytes.len(),
        })
    }

    /// Full eight-byte frame; usable in `const` contexts.
    pub const fn from_array(id: CanId, data: [u8; MAX_PAYLOAD_LEN]) -> Self {
        Self {
            id,
            data,
            len: MAX_PAYLOAD_LEN,
        }
    }

    /// Identifier the frame is sent under.
    pub const fn can_id(&self) -> CanId {
        self.id
    }

    /// Data Length Code (0 to 8).
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole payload buffer including the zero padding, as vendor drivers expect it.
    pub const fn raw_data(&self) -> &[u8; MAX_PAYLOAD_LEN] {
        &self.data
    }
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<embedded_can::Id>, data: &[u8]) -> Option<Self> {
        CanFrame::encode(CanId::from(id.into()), data).ok()
    }

    /// Remote frames are outside what the sequencer emits.
    fn new_remote(_id: impl Into<embedded_can::Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        self.id.is_extended()
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> embedded_can::Id {
        self.id.into()
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
