//! Channel configuration handed to [`CanDriver::open`](crate::CanDriver::open):
//! which adapter channel to open and at what bitrate.
use crate::error::ConfigError;

/// Channel handle of the first PCAN-USB adapter (`PCAN_USBBUS1`).
pub const PCAN_USBBUS1: u16 = 0x51;

//==================================================================================BITRATE
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Nominal bus bitrates supported by common USB adapters.
pub enum Bitrate {
    Kbps10,
    Kbps20,
    Kbps50,
    Kbps100,
    Kbps125,
    #[default]
    Kbps250,
    Kbps500,
    Kbps800,
    Mbps1,
}

impl Bitrate {
    /// Every preset, slowest first.
    pub const ALL: [Bitrate; 9] = [
        Bitrate::Kbps10,
        Bitrate::Kbps20,
        Bitrate::Kbps50,
        Bitrate::Kbps100,
        Bitrate::Kbps125,
        Bitrate::Kbps250,
        Bitrate::Kbps500,
        Bitrate::Kbps800,
        Bitrate::Mbps1,
    ];

    pub const fn bits_per_second(&self) -> u32 {
        match self {
            Bitrate::Kbps10 => 10_000,
            Bitrate::Kbps20 => 20_000,
            Bitrate::Kbps50 => 50_000,
            Bitrate::Kbps100 => 100_000,
            Bitrate::Kbps125 => 125_000,
            Bitrate::Kbps250 => 250_000,
            Bitrate::Kbps500 => 500_000,
            Bitrate::Kbps800 => 800_000,
            Bitrate::Mbps1 => 1_000_000,
        }
    }

    /// SJA1000-style BTR0/BTR1 timing word (the `PCAN_BAUD_*` values) for a 16 MHz clock.
    pub const fn btr0btr1(&self) -> u16 {
        match self {
            Bitrate::Kbps10 => 0x672F,
            Bitrate::Kbps20 => 0x532F,
            Bitrate::Kbps50 => 0x472F,
            Bitrate::Kbps100 => 0x432F,
            Bitrate::Kbps125 => 0x031C,
            Bitrate::Kbps250 => 0x011C,
            Bitrate::Kbps500 => 0x001C,
            Bitrate::Kbps800 => 0x0016,
            Bitrate::Mbps1 => 0x0014,
        }
    }

    /// Map a numeric bitrate onto a preset.
    pub fn from_bits_per_second(bits_per_second: u32) -> Result<Self, ConfigError> {
        Self::ALL
            .iter()
            .copied()
            .find(|bitrate| bitrate.bits_per_second() == bits_per_second)
            .ok_or(ConfigError::UnsupportedBitrate { bits_per_second })
    }
}

//==================================================================================CHANNEL_CONFIG
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Which channel to open and how. The driver interprets `channel` (a PCAN handle,
/// a socket index, a peripheral number...).
pub struct ChannelConfig {
    pub channel: u16,
    pub bitrate: Bitrate,
}

impl ChannelConfig {
    pub const fn new(channel: u16, bitrate: Bitrate) -> Self {
        Self { channel, bitrate }
    }

    /// Replace the channel handle.
    pub const fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// Replace the bitrate.
    pub const fn with_bitrate(mut self, bitrate: Bitrate) -> Self {
        self.bitrate = bitrate;
        self
    }
}

impl Default for ChannelConfig {
    /// First PCAN-USB channel at 250 kbit/s, the bench default.
    fn default() -> Self {
        Self::new(PCAN_USBBUS1, Bitrate::Kbps250)
    }
}
