/*!
    Audio output device negotiation (§6 `audio.output.*`).

    Wraps `cpal`: default host, default output device, a fixed-format
    stream built around a caller-supplied callback. The output spec here
    is interleaved S16, matching the resampler's fixed output format
    (§4.7), so the stream is built with `i16` as its sample type and no
    host-side format conversion is needed.
*/

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use zenplay_types::{Error, Result};

/// The negotiated output format (§6 `init(spec, ...)`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioOutputSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Device buffer size, expressed in milliseconds of audio. The exact
    /// device buffer size is platform-dependent; this is the tunable
    /// that gets exposed through configuration (§9 open question).
    pub buffer_ms: u32,
}

impl Default for AudioOutputSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            buffer_ms: 23,
        }
    }
}

impl AudioOutputSpec {
    pub fn buffer_frames(&self) -> u32 {
        (self.sample_rate * self.buffer_ms) / 1000
    }
}

/// An open output stream. Dropping it stops playback and releases the
/// device.
pub struct AudioOutputDevice {
    _stream: Stream,
}

impl AudioOutputDevice {
    /// Opens the default output device for `spec` and installs `fill`.
    /// `fill` is called on the audio subsystem's own thread and must
    /// never block or allocate (§4.8).
    pub fn open<F>(spec: AudioOutputSpec, mut fill: F) -> Result<Self>
    where
        F: FnMut(&mut [i16]) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::audio_device("no default output device"))?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "opening audio output device"
        );

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: SampleRate(spec.sample_rate),
            buffer_size: BufferSize::Fixed(spec.buffer_frames()),
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| fill(data),
                |err| tracing::error!(error = %err, "audio output stream error"),
                None,
            )
            .map_err(|e| Error::audio_device(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::audio_device(e.to_string()))?;

        Ok(Self { _stream: stream })
    }
}
