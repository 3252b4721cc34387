/*!
    Unified demuxer + prefetcher front-end (C4).

    Wraps [`Source`] and, for network locations with prefetch enabled,
    transparently hands it off to a [`Prefetcher`] thread. Callers always
    see the same `read_packet`/`seek` contract regardless of which mode is
    active.
*/

use std::path::Path;
use std::time::Duration;

use zenplay_types::{MediaInfo, Packet, Rational, Result};

use crate::codec_config::CodecConfig;
use crate::prefetch::{PrefetchConfig, Prefetcher};
use crate::source::{Source, SourceConfig};

enum Mode {
    Direct(Source),
    Prefetched(Prefetcher),
}

pub struct Demuxer {
    media_info: MediaInfo,
    video_time_base: Option<Rational>,
    audio_time_base: Option<Rational>,
    video_codec_config: Option<CodecConfig>,
    audio_codec_config: Option<CodecConfig>,
    is_network_source: bool,
    prefetch_config: PrefetchConfig,
    mode: Option<Mode>,
}

impl Demuxer {
    /// Opens `location` (file path or URL) and, if it resolves to a
    /// network source and `prefetch.enabled`, starts the prefetch thread.
    pub fn open<P: AsRef<Path>>(
        location: P,
        config: SourceConfig,
        prefetch: PrefetchConfig,
    ) -> Result<Self> {
        let mut source = Source::open(location, config)?;

        let media_info = source.media_info().clone();
        let video_time_base = source.video_time_base();
        let audio_time_base = source.audio_time_base();
        let video_codec_config = source.take_video_codec_config();
        let audio_codec_config = source.take_audio_codec_config();
        let is_network_source = source.is_network_source();

        let mode = if is_network_source && prefetch.enabled {
            Mode::Prefetched(Prefetcher::spawn(source, prefetch))
        } else {
            Mode::Direct(source)
        };

        Ok(Self {
            media_info,
            video_time_base,
            audio_time_base,
            video_codec_config,
            audio_codec_config,
            is_network_source,
            prefetch_config: prefetch,
            mode: Some(mode),
        })
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    pub fn video_time_base(&self) -> Option<Rational> {
        self.video_time_base
    }

    pub fn audio_time_base(&self) -> Option<Rational> {
        self.audio_time_base
    }

    pub fn has_video(&self) -> bool {
        self.media_info.has_video()
    }

    pub fn has_audio(&self) -> bool {
        self.media_info.has_audio()
    }

    pub fn is_network_source(&self) -> bool {
        self.is_network_source
    }

    /// Takes the video codec config, if video is present. Consumes it:
    /// callers build their decoder from it once, at `open()` time.
    pub fn take_video_codec_config(&mut self) -> Option<CodecConfig> {
        self.video_codec_config.take()
    }

    /// Takes the audio codec config, if audio is present.
    pub fn take_audio_codec_config(&mut self) -> Option<CodecConfig> {
        self.audio_codec_config.take()
    }

    /// Reads the next packet. `Ok(None)` means end of stream.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        match self.mode.as_mut().expect("demuxer mode missing") {
            Mode::Direct(source) => source.next_packet(),
            Mode::Prefetched(prefetcher) => prefetcher.read_packet(),
        }
    }

    /// Seeks the underlying container and flushes any prefetched
    /// lookahead. When prefetching, this briefly stops and recovers the
    /// worker thread to perform the seek on the thread that owns the
    /// FFmpeg input context, then respawns it.
    ///
    /// Callers are responsible for also flushing packet queues, decoder
    /// state, and frame queues (§4.11); this only covers the demux stage.
    pub fn seek(&mut self, position: Duration) -> Result<Duration> {
        let mode = self.mode.take().expect("demuxer mode missing");
        let (result, mode) = match mode {
            Mode::Direct(mut source) => {
                let result = source.seek(position);
                (result, Mode::Direct(source))
            }
            Mode::Prefetched(prefetcher) => {
                let mut source = prefetcher.stop_and_recover();
                let result = source.seek(position);
                let prefetcher = Prefetcher::spawn(source, self.prefetch_config);
                (result, Mode::Prefetched(prefetcher))
            }
        };
        self.mode = Some(mode);
        result
    }
}
