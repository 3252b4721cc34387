/*!
    Media decoding for the ZenPlay playback core.

    This crate transforms encoded packets into raw frames. It handles the
    computationally intensive work of codec decoding, including hardware
    acceleration when available, via FFmpeg's send/receive decoding API.
*/

mod audio;
mod config;
mod hw;
mod video;

pub use audio::AudioDecoder;
pub use config::{AudioDecoderConfig, VideoDecoderConfig};
pub use hw::{HwBackend, HwDeviceContext, PoolSizeInputs, is_hw_frame, transfer_hw_frame};
pub use video::VideoDecoder;
