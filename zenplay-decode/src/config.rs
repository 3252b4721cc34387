/*!
    Decoder configuration.
*/

use crate::hw::{HwBackend, PoolSizeInputs};

/**
    Configuration for a [`crate::video::VideoDecoder`].
*/
#[derive(Clone, Debug, Default)]
pub struct VideoDecoderConfig {
    /// Whether to attempt hardware-accelerated decoding at all.
    pub prefer_hw: bool,
    /// A specific backend to try, bypassing platform auto-detection.
    pub hw_device: Option<HwBackend>,
    /// Inputs to the hardware frames-pool sizing formula (§4.6). Only
    /// consulted when `prefer_hw` is set and a device context is created.
    pub pool_inputs: Option<PoolSizeInputs>,
}

impl VideoDecoderConfig {
    /**
        Enable hardware acceleration, optionally pinned to a specific backend.

        When `backend` is `None`, the decoder probes the platform's preferred
        backends in priority order via [`HwBackend::platform_candidates`].
    */
    pub fn with_hw_accel(mut self, backend: Option<HwBackend>) -> Self {
        self.prefer_hw = true;
        self.hw_device = backend;
        self
    }

    pub fn with_pool_inputs(mut self, inputs: PoolSizeInputs) -> Self {
        self.pool_inputs = Some(inputs);
        self
    }

    pub(crate) fn pool_inputs_or_default(&self) -> PoolSizeInputs {
        self.pool_inputs.unwrap_or(PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 1,
            downstream_queue_capacity: 30,
        })
    }
}

/**
    Configuration for an [`crate::audio::AudioDecoder`].

    Audio decoding has no hardware path; this exists for symmetry and future
    extension (e.g. forcing a decoder thread count).
*/
#[derive(Clone, Debug, Default)]
pub struct AudioDecoderConfig {
    pub thread_count: Option<u32>,
}
