/*!
    Media source and demuxing for the ZenPlay playback core.

    This crate handles the input side of the media pipeline. It opens local
    paths and network URLs (`http(s)://`, `rtsp://`, `rtmp://`, `udp://`,
    `rtp://`, `mms://`) through FFmpeg's own protocol handlers, applies the
    per-scheme option matrix (buffer size, timeout, reconnect) from §4.4,
    and produces encoded packets that downstream crates decode.

    # Example

    ```ignore
    use zenplay_source::{open, probe};

    // Probe a file for metadata
    let info = probe("video.mp4")?;
    println!("Duration: {:?}", info.duration);
    println!("Has video: {}", info.has_video());
    println!("Has audio: {}", info.has_audio());

    // Open and read packets
    let mut source = open("video.mp4")?;
    while let Some(packet) = source.next_packet()? {
        match packet.stream_type {
            StreamType::Video => { /* decode video */ }
            StreamType::Audio => { /* decode audio */ }
        }
    }
    ```

    # Architecture

    - [`Source`] owns the FFmpeg input context and the per-scheme option
      matrix; it is the only thing that talks to libavformat directly.
    - [`Demuxer`] wraps a `Source` and, for network locations with
      prefetch enabled, hands it off to an internal prefetch worker thread
      transparently — callers see the same `read_packet`/`seek` contract
      either way.

    All source types produce the same `Packet` type, allowing downstream
    decoders to work uniformly regardless of input source.
*/

pub use zenplay_types::{
    AudioStreamInfo, Error, MediaInfo, Packet, Result, StreamType, VideoStreamInfo,
};

mod codec_config;
mod convert;
mod demuxer;
mod prefetch;
mod probe;
mod source;

pub use codec_config::CodecConfig;
pub use demuxer::Demuxer;
pub use prefetch::PrefetchConfig;
pub use probe::probe;
pub use source::{NetworkOptions, Source, SourceConfig, StreamFilter, open, open_with_config};
