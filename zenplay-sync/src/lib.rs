/*!
    Playback state machine and A/V synchronization for the ZenPlay playback
    core.

    This crate has two responsibilities that every worker thread in
    `zenplay-player` depends on: the process-wide [`StateManager`] (pause,
    stop, and resume semantics shared across threads) and the
    [`SyncController`] (master-clock selection and EWMA-smoothed drift
    tracking between the audio and video pipelines).
*/

mod clock;
mod state_manager;
mod sync_controller;

pub use clock::{SyncConfig, SyncMode};
pub use state_manager::StateManager;
pub use sync_controller::SyncController;

pub use zenplay_types::PlayerState;
