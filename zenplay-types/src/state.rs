/*!
    Playback state machine states.
*/

/// The player's coarse-grained lifecycle state. Transitions are serialized
/// by the state manager; every worker observes it only through
/// `should_stop()`, `should_pause()`, and `wait_for_resume()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Idle,
    Opening,
    Ready,
    Playing,
    Paused,
    Seeking,
    Stopping,
    Stopped,
    Error,
}

impl PlayerState {
    /// `Error` may only transition to `Stopped`; every other state may
    /// transition freely (the state manager does not otherwise validate
    /// edges).
    pub fn can_transition_to(self, next: PlayerState) -> bool {
        if self == PlayerState::Error {
            return next == PlayerState::Stopped;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_only_transitions_to_stopped() {
        assert!(!PlayerState::Error.can_transition_to(PlayerState::Playing));
        assert!(PlayerState::Error.can_transition_to(PlayerState::Stopped));
    }

    #[test]
    fn other_states_transition_freely() {
        assert!(PlayerState::Playing.can_transition_to(PlayerState::Paused));
        assert!(PlayerState::Idle.can_transition_to(PlayerState::Error));
    }
}
