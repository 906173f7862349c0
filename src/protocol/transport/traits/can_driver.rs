//! Minimal abstraction over a vendor CAN adapter. Lets the sequencer plug into
//! various implementations (PCAN-Basic binding, SocketCAN, embedded HAL, test doubles).
use crate::protocol::transport::{can_frame::CanFrame, channel_config::ChannelConfig};
use core::future::Future;

/// Transmit-only contract: open a channel, push frames through it, close it.
///
/// `close` takes the channel by value, so a channel obtained from `open` can be
/// released at most once.
pub trait CanDriver {
    /// Adapter status code or error value. `Clone` so run outcomes can be reported
    /// to several observers.
    type Error: core::fmt::Debug + Clone;
    /// Handle for an initialized bus connection.
    type Channel;

    /// Initialize the channel named by `config` at its bitrate.
    fn open<'a>(
        &'a mut self,
        config: &'a ChannelConfig,
    ) -> impl Future<Output = Result<Self::Channel, Self::Error>> + 'a;

    /// Queue one frame for transmission. No timeout is imposed by the sequencer.
    fn transmit<'a>(
        &'a mut self,
        channel: &'a mut Self::Channel,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Release the channel.
    fn close<'a>(
        &'a mut self,
        channel: Self::Channel,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
}
