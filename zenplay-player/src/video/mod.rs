//! Video presentation subsystem (C9): the dedicated render thread and its
//! present/drop/repeat policy.

mod player;

pub use player::{VideoPlayer, VideoPlayerConfig, VideoThresholds};
