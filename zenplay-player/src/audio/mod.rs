//! Audio output subsystem (C8): device negotiation plus the bounded-queue
//! player that feeds it.

mod device;
mod player;

pub use device::{AudioOutputDevice, AudioOutputSpec};
pub use player::{AudioPlayer, AudioPlayerConfig};
