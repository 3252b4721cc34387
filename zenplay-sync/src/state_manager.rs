/*!
    Process-wide playback state machine (C2).
*/

use parking_lot::{Condvar, Mutex};
use zenplay_types::PlayerState;

type Listener = Box<dyn Fn(PlayerState) + Send + Sync>;

struct Inner {
    state: PlayerState,
    listeners: Vec<Listener>,
}

/// Owns the player's `PlayerState` behind a mutex/condvar pair. Every worker
/// thread consults `should_stop()`, `should_pause()`, and
/// `wait_for_resume()` instead of holding its own flags, so a single
/// transition is visible to all of them without extra plumbing.
pub struct StateManager {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PlayerState::Idle,
                listeners: Vec::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn should_stop(&self) -> bool {
        matches!(
            self.state(),
            PlayerState::Stopping | PlayerState::Stopped | PlayerState::Error
        )
    }

    pub fn should_pause(&self) -> bool {
        matches!(self.state(), PlayerState::Paused | PlayerState::Seeking)
    }

    /// Blocks the calling thread until the state leaves `Paused`/`Seeking`
    /// or a stop is requested. Returns immediately if neither holds.
    pub fn wait_for_resume(&self) {
        let mut inner = self.inner.lock();
        while matches!(inner.state, PlayerState::Paused | PlayerState::Seeking) {
            self.condvar.wait(&mut inner);
        }
    }

    /// Transitions to `next`, enforcing the `Error -> Stopped`-only rule and
    /// notifying listeners and waiters. Returns `false` (no-op) if the
    /// transition is disallowed.
    pub fn transition(&self, next: PlayerState) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.can_transition_to(next) {
            tracing::warn!(from = ?inner.state, to = ?next, "rejected invalid state transition");
            return false;
        }
        let prev = inner.state;
        inner.state = next;
        tracing::info!(from = ?prev, to = ?next, "playback state transition");

        // Run listeners while still holding the lock: they must be
        // non-blocking by contract, and serializing them against concurrent
        // transitions avoids observing states out of order.
        for listener in &inner.listeners {
            listener(next);
        }

        self.condvar.notify_all();
        true
    }

    /// Registers a listener invoked synchronously on every transition.
    /// Listener callbacks must not block.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(PlayerState) + Send + Sync + 'static,
    {
        self.inner.lock().listeners.push(Box::new(listener));
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn error_can_only_transition_to_stopped() {
        let sm = StateManager::new();
        sm.transition(PlayerState::Error);
        assert!(!sm.transition(PlayerState::Playing));
        assert_eq!(sm.state(), PlayerState::Error);
        assert!(sm.transition(PlayerState::Stopped));
        assert_eq!(sm.state(), PlayerState::Stopped);
    }

    #[test]
    fn listeners_fire_on_every_transition() {
        let sm = StateManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        sm.add_listener(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        sm.transition(PlayerState::Opening);
        sm.transition(PlayerState::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wait_for_resume_unblocks_on_playing() {
        let sm = Arc::new(StateManager::new());
        sm.transition(PlayerState::Paused);

        let sm2 = Arc::clone(&sm);
        let handle = thread::spawn(move || {
            sm2.wait_for_resume();
        });

        thread::sleep(Duration::from_millis(20));
        sm.transition(PlayerState::Playing);
        handle.join().unwrap();
    }

    #[test]
    fn should_stop_true_for_terminal_states() {
        let sm = StateManager::new();
        assert!(!sm.should_stop());
        sm.transition(PlayerState::Stopping);
        assert!(sm.should_stop());
    }
}
