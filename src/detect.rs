//! One-shot key discovery: arm the latch, press a key, get its id back.
//!
//! The reader calls [`DetectionLatch::observe`] for every parsed sample;
//! while armed, the first sample above the deadzone is reported exactly once
//! through a last-value watch slot and the latch returns to idle. Samples
//! seen while idle are ignored here and still feed the mapping pass. There
//! is no timeout; the latch stays armed until a press arrives or it is
//! explicitly disarmed.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedKey {
    pub key_id: u8,
    pub pressure: u16,
}

pub struct DetectionLatch {
    armed: AtomicBool,
    result_tx: watch::Sender<Option<DetectedKey>>,
}

impl Default for DetectionLatch {
    fn default() -> Self {
        let (result_tx, _) = watch::channel(None);
        Self {
            armed: AtomicBool::new(false),
            result_tx,
        }
    }
}

impl DetectionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for the next qualifying press, discarding any stale result.
    pub fn arm(&self) {
        self.result_tx.send_replace(None);
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Feed one parsed sample through the latch. Returns the detection if
    /// this sample consumed the armed state.
    pub fn observe(&self, key_id: u8, pressure: u16, deadzone: u16) -> Option<DetectedKey> {
        if pressure <= deadzone {
            return None;
        }
        // Swap rather than load-then-store so the armed state is consumed
        // exactly once per arm cycle.
        if !self.armed.swap(false, Ordering::SeqCst) {
            return None;
        }
        let detected = DetectedKey { key_id, pressure };
        self.result_tx.send_replace(Some(detected));
        Some(detected)
    }

    /// Last-value slot a consumer can await; never blocks the reader.
    pub fn subscribe(&self) -> watch::Receiver<Option<DetectedKey>> {
        self.result_tx.subscribe()
    }
}
