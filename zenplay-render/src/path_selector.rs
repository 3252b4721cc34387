/*!
    Render-path selection (C11).

    Decides, once per open, whether a hardware zero-copy renderer can be
    used and which backend it should bind, or falls back to software.
*/

use zenplay_decode::{HwBackend, HwDeviceContext, PoolSizeInputs};
use zenplay_types::{CodecId, Error, Result};

use crate::renderer::{Renderer, SoftwareRenderer, ZeroCopyRenderer};

/// Per-backend allow-flags plus the overall hardware/software switch, as
/// surfaced through configuration (§6 `render.hardware.*`).
#[derive(Clone, Copy, Debug)]
pub struct RenderPathConfig {
    pub use_hardware: bool,
    pub allow_d3d11va: bool,
    pub allow_dxva2: bool,
    pub allow_vaapi: bool,
    pub allow_videotoolbox: bool,
    /// If every candidate backend fails, fall back to software instead of
    /// erroring out entirely.
    pub allow_fallback: bool,
}

impl Default for RenderPathConfig {
    fn default() -> Self {
        Self {
            use_hardware: true,
            allow_d3d11va: true,
            allow_dxva2: true,
            allow_vaapi: true,
            allow_videotoolbox: true,
            allow_fallback: true,
        }
    }
}

impl RenderPathConfig {
    fn allows(&self, backend: HwBackend) -> bool {
        match backend {
            HwBackend::D3d11va => self.allow_d3d11va,
            HwBackend::Dxva2 => self.allow_dxva2,
            HwBackend::Vaapi => self.allow_vaapi,
            HwBackend::VideoToolbox => self.allow_videotoolbox,
        }
    }
}

/// The outcome of render-path selection: a renderer already `init`-ready to
/// use, plus diagnostics about how it was chosen.
pub struct RenderPathSelection {
    pub renderer: Box<dyn Renderer>,
    pub hw_context: Option<HwDeviceContext>,
    /// The backend the selection bound to, so a caller constructing a
    /// decoder can request the same backend rather than re-probing.
    pub backend: Option<HwBackend>,
    pub backend_name: &'static str,
    pub reason: String,
    pub is_hardware: bool,
}

/// Selects a render path per the five-step algorithm:
/// 1. If hardware is disabled by config, go straight to software.
/// 2. Otherwise probe platform candidate backends in priority order,
///    skipping any the config disallows.
/// 3. The first backend whose device context construction succeeds wins.
/// 4. If no candidate succeeds and fallback is allowed, use software.
/// 5. If no candidate succeeds and fallback is disallowed, error.
pub fn select_render_path(
    codec: CodecId,
    width: u32,
    height: u32,
    config: RenderPathConfig,
    pool_inputs: PoolSizeInputs,
) -> Result<RenderPathSelection> {
    if !codec.is_video() {
        return Err(Error::invalid_argument(
            "render-path selection requires a video codec",
        ));
    }

    if !config.use_hardware {
        tracing::info!(width, height, "render path: software (hardware disabled)");
        return Ok(RenderPathSelection {
            renderer: Box::new(SoftwareRenderer::new()),
            hw_context: None,
            backend: None,
            backend_name: "software",
            reason: "hardware acceleration disabled by configuration".to_string(),
            is_hardware: false,
        });
    }

    for &backend in HwBackend::platform_candidates() {
        if !config.allows(backend) {
            tracing::debug!(backend = backend.name(), "render path: backend disallowed by config, skipping");
            continue;
        }
        if let Some(hw_ctx) = HwDeviceContext::try_create(backend, pool_inputs) {
            tracing::info!(
                backend = backend.name(),
                width,
                height,
                "render path: zero-copy hardware"
            );
            return Ok(RenderPathSelection {
                renderer: Box::new(ZeroCopyRenderer::new()),
                hw_context: Some(hw_ctx),
                backend: Some(backend),
                backend_name: backend.name(),
                reason: format!("{} device context created", backend.name()),
                is_hardware: true,
            });
        }
        tracing::warn!(backend = backend.name(), "render path: backend probe failed");
    }

    if config.allow_fallback {
        tracing::warn!("render path: falling back to software, no hardware backend available");
        Ok(RenderPathSelection {
            renderer: Box::new(SoftwareRenderer::new()),
            hw_context: None,
            backend: None,
            backend_name: "software",
            reason: "no hardware backend available, falling back to software".to_string(),
            is_hardware: false,
        })
    } else {
        Err(Error::hardware_init_failed(
            "no hardware backend available and fallback is disallowed",
        ))
    }
}

/// Exposes the decoder-side GPU device handle the zero-copy renderer must
/// bind to, bridging `zenplay-decode`'s FFmpeg-typed pointer to the
/// renderer's opaque one.
pub fn shared_gpu_device(hw_context: &HwDeviceContext) -> Option<*mut std::ffi::c_void> {
    hw_context
        .get_shared_device()
        .map(|p| p as *mut std::ffi::c_void)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_forced_when_hardware_disabled() {
        let config = RenderPathConfig {
            use_hardware: false,
            ..Default::default()
        };
        let pool = PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 4,
            downstream_queue_capacity: 30,
        };
        let selection = select_render_path(CodecId::H264, 1920, 1080, config, pool).unwrap();
        assert!(!selection.is_hardware);
        assert_eq!(selection.backend_name, "software");
    }

    #[test]
    fn non_video_codec_rejected() {
        let config = RenderPathConfig::default();
        let pool = PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 4,
            downstream_queue_capacity: 30,
        };
        assert!(select_render_path(CodecId::Aac, 1920, 1080, config, pool).is_err());
    }

    #[test]
    fn fallback_disallowed_surfaces_error_when_no_backend_available() {
        // On a platform with no candidate backends compiled in (or in a CI
        // sandbox without the relevant hardware), every probe fails; with
        // fallback disallowed this must error rather than silently degrade.
        if !HwBackend::platform_candidates().is_empty() {
            return;
        }
        let config = RenderPathConfig {
            allow_fallback: false,
            ..Default::default()
        };
        let pool = PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 4,
            downstream_queue_capacity: 30,
        };
        assert!(select_render_path(CodecId::H264, 1920, 1080, config, pool).is_err());
    }
}
