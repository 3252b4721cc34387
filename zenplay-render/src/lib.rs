/*!
    Renderer abstraction and render-path selection for the ZenPlay playback
    core.

    `zenplay-render` owns the presentation surface: the [`Renderer`] trait
    that the playback controller drives from the video render thread, its
    software and zero-copy implementations, and the [`select_render_path`]
    decision that picks between them once per open.
*/

mod path_selector;
mod renderer;

pub use path_selector::{select_render_path, shared_gpu_device, RenderPathConfig, RenderPathSelection};
pub use renderer::{Renderer, RenderableFrame, SoftwareRenderer, WindowHandle, ZeroCopyRenderer};
