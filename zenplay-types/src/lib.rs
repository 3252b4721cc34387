/*!
    Shared types for the ZenPlay playback core.

    This crate has no dependency on any decoding library. It defines the
    data model: packets, timestamps, decoded frames, stream/media metadata,
    and the error taxonomy that every other crate in the workspace returns.
*/

mod codec;
mod error;
mod format;
mod frame;
mod packet;
mod queue;
mod rational;
mod state;
mod stream;

pub use codec::CodecId;
pub use error::{Error, Result};
pub use format::{ChannelLayout, PixelFormat, SampleFormat};
pub use frame::{AudioFrame, ResampledAudioFrame, VideoFrame};
pub use packet::{MediaDuration, Packet, Pts, StreamType};
pub use queue::BlockingQueue;
pub use rational::Rational;
pub use state::PlayerState;
pub use stream::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
