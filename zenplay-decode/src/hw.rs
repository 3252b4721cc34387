/*!
    Hardware decoder context.

    Builds a platform-appropriate FFmpeg hardware device context (VideoToolbox,
    D3D11VA, DXVA2, VAAPI) and sizes its frames pool. Construction failure is
    never fatal here; callers fall back to software decoding.
*/

use ffmpeg_next::ffi;
use ffmpeg_next::util::frame::video::Video as VideoFrameFFmpeg;

use zenplay_types::{Error, Result};

/// Hardware backends considered, in platform priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwBackend {
    VideoToolbox,
    D3d11va,
    Dxva2,
    Vaapi,
}

impl HwBackend {
    fn av_type(self) -> ffi::AVHWDeviceType {
        match self {
            Self::VideoToolbox => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            Self::D3d11va => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            Self::Dxva2 => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
            Self::Vaapi => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::VideoToolbox => "videotoolbox",
            Self::D3d11va => "d3d11va",
            Self::Dxva2 => "dxva2",
            Self::Vaapi => "vaapi",
        }
    }

    /// Backends worth trying on this platform, in priority order.
    pub fn platform_candidates() -> &'static [HwBackend] {
        #[cfg(target_os = "macos")]
        {
            &[HwBackend::VideoToolbox]
        }
        #[cfg(target_os = "windows")]
        {
            &[HwBackend::D3d11va, HwBackend::Dxva2]
        }
        #[cfg(target_os = "linux")]
        {
            &[HwBackend::Vaapi]
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            &[]
        }
    }
}

/// Inputs to the frames-pool sizing formula (§4.6).
#[derive(Clone, Copy, Debug)]
pub struct PoolSizeInputs {
    pub base: u32,
    pub b_frames: u32,
    pub thread_count: u32,
    /// Downstream video-frame queue capacity; headroom scales with it.
    pub downstream_queue_capacity: u32,
}

impl PoolSizeInputs {
    /// `headroom ~= 12` for a downstream queue around 30; `~= 6` for smaller
    /// queues. Scaled linearly against the observed ~30:12 ratio rather than
    /// hard-coded, so unusually deep queues still get proportional headroom.
    pub fn pool_size(self) -> u32 {
        let headroom = ((self.downstream_queue_capacity as f64) * (12.0 / 30.0)).round() as u32;
        let headroom = headroom.max(6);
        self.base + self.b_frames + self.thread_count + headroom
    }
}

/// A constructed hardware device context, kept alive for the lifetime of the
/// decoder that uses it.
pub struct HwDeviceContext {
    backend: HwBackend,
    device_ctx: *mut ffi::AVBufferRef,
    pool_size: u32,
}

unsafe impl Send for HwDeviceContext {}

impl HwDeviceContext {
    /// Try to create a device context for `backend`. Returns `None` on any
    /// failure. The caller is expected to try the next candidate or give up
    /// and fall back to software.
    pub fn try_create(backend: HwBackend, pool: PoolSizeInputs) -> Option<Self> {
        let pool_size = pool.pool_size();
        unsafe {
            let mut device_ctx: *mut ffi::AVBufferRef = std::ptr::null_mut();
            let ret = ffi::av_hwdevice_ctx_create(
                &mut device_ctx,
                backend.av_type(),
                std::ptr::null(),
                std::ptr::null_mut(),
                0,
            );
            if ret < 0 || device_ctx.is_null() {
                tracing::warn!(backend = backend.name(), ret, "hardware device context creation failed");
                return None;
            }
            tracing::info!(backend = backend.name(), pool_size, "hardware device context created");
            Some(Self {
                backend,
                device_ctx,
                pool_size,
            })
        }
    }

    /// Probe every platform candidate in priority order, returning the first
    /// that succeeds.
    pub fn try_create_any(pool: PoolSizeInputs) -> Option<Self> {
        HwBackend::platform_candidates()
            .iter()
            .find_map(|&backend| Self::try_create(backend, pool))
    }

    pub fn backend(&self) -> HwBackend {
        self.backend
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Returns a new reference to the underlying device buffer, suitable for
    /// assignment to `AVCodecContext.hw_device_ctx`. The decoder takes
    /// ownership of this reference; `self` retains its own.
    pub fn create_ref(&self) -> *mut ffi::AVBufferRef {
        unsafe { ffi::av_buffer_ref(self.device_ctx) }
    }

    /// The GPU device the renderer must bind to in order to share textures
    /// with the decoder, or `None` on platforms without hardware rendering.
    pub fn get_shared_device(&self) -> Option<*mut ffi::AVBufferRef> {
        Some(self.device_ctx)
    }
}

impl Drop for HwDeviceContext {
    fn drop(&mut self) {
        unsafe {
            ffi::av_buffer_unref(&mut self.device_ctx);
        }
    }
}

impl std::fmt::Debug for HwDeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HwDeviceContext")
            .field("backend", &self.backend.name())
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Returns true if `frame` is still resident on the GPU (hardware pixel
/// format) and needs `transfer_hw_frame` before it can be read on the CPU.
pub fn is_hw_frame(frame: &VideoFrameFFmpeg) -> bool {
    unsafe {
        let fmt = (*frame.as_ptr()).format;
        matches!(
            fmt,
            f if f == ffi::AVPixelFormat::AV_PIX_FMT_VIDEOTOOLBOX as i32
                || f == ffi::AVPixelFormat::AV_PIX_FMT_D3D11 as i32
                || f == ffi::AVPixelFormat::AV_PIX_FMT_DXVA2_VLD as i32
                || f == ffi::AVPixelFormat::AV_PIX_FMT_VAAPI as i32
        )
    }
}

/// Transfer a hardware frame's data into a freshly allocated software frame.
pub fn transfer_hw_frame(hw_frame: &VideoFrameFFmpeg) -> Result<VideoFrameFFmpeg> {
    unsafe {
        let mut sw_frame = VideoFrameFFmpeg::empty();
        let ret = ffi::av_hwframe_transfer_data(sw_frame.as_mut_ptr(), hw_frame.as_ptr(), 0);
        if ret < 0 {
            return Err(Error::hardware_init_failed(format!(
                "hwframe transfer failed: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }
        (*sw_frame.as_mut_ptr()).pts = (*hw_frame.as_ptr()).pts;
        Ok(sw_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_scales_with_queue_capacity() {
        let deep = PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 4,
            downstream_queue_capacity: 30,
        };
        let shallow = PoolSizeInputs {
            base: 4,
            b_frames: 2,
            thread_count: 4,
            downstream_queue_capacity: 6,
        };
        assert_eq!(deep.pool_size(), 4 + 2 + 4 + 12);
        assert!(shallow.pool_size() < deep.pool_size());
    }

    #[test]
    fn pool_size_never_below_minimum_headroom() {
        let tiny = PoolSizeInputs {
            base: 1,
            b_frames: 0,
            thread_count: 1,
            downstream_queue_capacity: 0,
        };
        assert_eq!(tiny.pool_size(), 1 + 0 + 1 + 6);
    }
}
