//! Table of currently pressed keys and their last raw pressures.
//!
//! The reader thread is the only mutator; everyone else takes a snapshot
//! copy and iterates that. Both operations are single short critical
//! sections with no I/O inside, so the reader never stalls behind a
//! consumer and vice versa.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct ActiveKeys {
    keys: Mutex<HashMap<u8, u16>>,
}

impl ActiveKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest sample for a key. A key is held only while its
    /// pressure exceeds the deadzone; at or below it the entry is removed,
    /// so the table never contains a released key.
    pub fn update(&self, key_id: u8, pressure: u16, deadzone: u16) {
        let mut keys = self.keys.lock().unwrap();
        if pressure > deadzone {
            keys.insert(key_id, pressure);
        } else {
            keys.remove(&key_id);
        }
    }

    /// Independent copy of the table, safe to iterate without the lock.
    pub fn snapshot(&self) -> HashMap<u8, u16> {
        self.keys.lock().unwrap().clone()
    }

    /// Drop everything. Called on session teardown so a reconnect starts
    /// from a released state.
    pub fn clear(&self) {
        self.keys.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADZONE: u16 = 30;

    #[test]
    fn test_press_and_release() {
        let active = ActiveKeys::new();
        active.update(4, 700, DEADZONE);
        assert_eq!(active.snapshot().get(&4), Some(&700));

        active.update(4, 350, DEADZONE);
        assert_eq!(active.snapshot().get(&4), Some(&350));

        active.update(4, DEADZONE, DEADZONE);
        assert!(active.snapshot().is_empty());
    }

    #[test]
    fn test_below_deadzone_never_enters() {
        let active = ActiveKeys::new();
        active.update(4, 20, DEADZONE);
        assert!(active.is_empty());
        // Removing an absent key is a no-op, not an error.
        active.update(9, 0, DEADZONE);
        assert!(active.is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let active = ActiveKeys::new();
        active.update(4, 700, DEADZONE);
        let snap = active.snapshot();
        active.update(4, 10, DEADZONE);
        active.update(7, 500, DEADZONE);
        assert_eq!(snap.get(&4), Some(&700));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_clear_wipes_all() {
        let active = ActiveKeys::new();
        active.update(4, 700, DEADZONE);
        active.update(7, 500, DEADZONE);
        assert_eq!(active.len(), 2);
        active.clear();
        assert!(active.is_empty());
    }
}
