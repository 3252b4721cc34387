/*!
    Media frame transformation for the ZenPlay playback core.

    This crate converts decoded audio frames into the fixed output spec
    the audio player requires: resampling, channel layout conversion, and
    sample format conversion. The resampling context is cached and
    reinitialized only when the source format changes, avoiding
    per-frame allocation on the steady-state path.
*/

mod audio;

pub use audio::{AudioTransform, AudioTransformConfig};
