//! The analog keyboard session: device discovery, the blocking read loop,
//! and the pipeline from raw report to submitted gamepad frame.
//!
//! Exactly two parties touch the session state: the dedicated reader thread
//! (sole mutator of the active-key table, sole writer to the pad) and a
//! consumer that snapshots published values or issues control commands.
//! The reader never waits on the consumer; frames go out through a
//! last-value watch slot in parse order.

use anyhow::{bail, Context, Result};
use hidapi::{HidApi, HidDevice};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::config::SharedConfig;
use crate::detect::DetectionLatch;
use crate::keys::key_display;
use crate::mapping::{build_frame, PadFrame};
use crate::pad::VirtualPad;
use crate::report::{parse_report, REPORT_LEN};
use crate::state::ActiveKeys;

pub const KEYBOARD_VID: u16 = 0x41E4;
pub const KEYBOARD_PID: u16 = 0x211A;
/// The interface that carries analog traffic on the reference board.
const ANALOG_INTERFACE: i32 = 1;

/// A blocking read cannot observe cancellation, so reads run with a short
/// timeout and the token is re-checked between them.
const READ_TIMEOUT_MS: i32 = 200;
/// Grace period on teardown for the reader to observe cancellation before
/// the device and pad handles are released.
const TEARDOWN_GRACE_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct KeyboardInterfaceInfo {
    pub interface_number: i32,
    pub product: String,
    pub path: String,
}

/// What the reader publishes after each mapping pass. Consumers that miss
/// an update simply see the next one; staleness is fine, reordering is not.
#[derive(Debug, Clone, Default)]
pub struct FrameUpdate {
    pub frame: PadFrame,
    pub key_id: u8,
    pub raw_pressure: u16,
    pub active_count: usize,
}

/// List the HID interfaces that belong to the keyboard.
pub fn enumerate_interfaces(api: &HidApi) -> Vec<KeyboardInterfaceInfo> {
    let mut interfaces: Vec<KeyboardInterfaceInfo> = api
        .device_list()
        .filter(|d| d.vendor_id() == KEYBOARD_VID && d.product_id() == KEYBOARD_PID)
        .map(|d| KeyboardInterfaceInfo {
            interface_number: d.interface_number(),
            product: d.product_string().unwrap_or("Unknown").to_string(),
            path: d.path().to_string_lossy().to_string(),
        })
        .collect();
    interfaces.sort_by_key(|i| i.interface_number);
    interfaces
}

/// Open the keyboard, preferring the analog interface; other interfaces of
/// the same device are tried as a fallback (some firmwares expose the
/// vendor reports elsewhere).
pub fn open_keyboard(api: &HidApi) -> Result<HidDevice> {
    let mut candidates: Vec<_> = api
        .device_list()
        .filter(|d| d.vendor_id() == KEYBOARD_VID && d.product_id() == KEYBOARD_PID)
        .collect();
    candidates.sort_by_key(|d| (d.interface_number() != ANALOG_INTERFACE) as u8);

    if candidates.is_empty() {
        bail!(
            "No keyboard found (VID {KEYBOARD_VID:04X} PID {KEYBOARD_PID:04X}). \
            Is the board plugged in, and do you have hidraw permissions?"
        );
    }

    for candidate in candidates {
        match candidate.open_device(api) {
            Ok(device) => {
                info!(
                    "Opened keyboard interface {} ({})",
                    candidate.interface_number(),
                    candidate.product_string().unwrap_or("Unknown")
                );
                return Ok(device);
            }
            Err(e) => {
                warn!(
                    "Could not open interface {}: {e}",
                    candidate.interface_number()
                );
            }
        }
    }
    bail!("Found the keyboard but could not open any of its interfaces")
}

pub struct KeyboardManager {
    debug: bool,
    config: SharedConfig,
    active: Arc<ActiveKeys>,
    latch: Arc<DetectionLatch>,
    frame_tx: watch::Sender<FrameUpdate>,
    ended_tx: watch::Sender<bool>,
    stop_token: CancellationToken,
    reader: Option<task::JoinHandle<()>>,
}

impl KeyboardManager {
    pub fn new(config: SharedConfig, debug: bool) -> Self {
        let (frame_tx, _) = watch::channel(FrameUpdate::default());
        let (ended_tx, _) = watch::channel(false);
        Self {
            debug,
            config,
            active: Arc::new(ActiveKeys::new()),
            latch: Arc::new(DetectionLatch::new()),
            frame_tx,
            ended_tx,
            stop_token: CancellationToken::new(),
            reader: None,
        }
    }

    pub fn active_keys(&self) -> Arc<ActiveKeys> {
        self.active.clone()
    }

    pub fn detection(&self) -> Arc<DetectionLatch> {
        self.latch.clone()
    }

    /// Last-value slot with the most recent frame and debug sample.
    pub fn subscribe_frames(&self) -> watch::Receiver<FrameUpdate> {
        self.frame_tx.subscribe()
    }

    /// Becomes true when the session dies on its own (device unplugged or
    /// another fatal stream error).
    pub fn subscribe_session_end(&self) -> watch::Receiver<bool> {
        self.ended_tx.subscribe()
    }

    /// Open the device and the virtual pad and start the reader thread.
    pub fn start(&mut self) -> Result<()> {
        let api = HidApi::new().context("Failed to initialize hidapi")?;
        let device = open_keyboard(&api)?;
        let pad = VirtualPad::new()?;

        let active = self.active.clone();
        let latch = self.latch.clone();
        let config = self.config.clone();
        let frame_tx = self.frame_tx.clone();
        let ended_tx = self.ended_tx.clone();
        let token = self.stop_token.child_token();
        let debug = self.debug;

        self.reader = Some(task::spawn_blocking(move || {
            read_loop(device, pad, active, latch, config, frame_tx, debug, &token);
            // Reader owns the device and pad handles; they are released
            // here, after the loop has fully wound down.
            let _ = ended_tx.send(true);
        }));

        info!("Keyboard session started.");
        Ok(())
    }

    /// Cooperative teardown: cancel, give the reader a grace period to
    /// observe it, then wait for the handles to be released.
    pub async fn stop(&mut self) {
        self.stop_token.cancel();
        tokio::time::sleep(std::time::Duration::from_millis(TEARDOWN_GRACE_MS)).await;
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("Reader thread did not shut down cleanly: {e}");
            }
        }
        self.active.clear();
        self.latch.disarm();
        info!("Keyboard session stopped.");
    }
}

/// The blocking read loop. Everything between reads is synchronous and
/// bounded: parse, one short state-store critical section, curve mapping,
/// frame aggregation, one pad write, one watch publish.
fn read_loop(
    device: HidDevice,
    mut pad: VirtualPad,
    active: Arc<ActiveKeys>,
    latch: Arc<DetectionLatch>,
    config: SharedConfig,
    frame_tx: watch::Sender<FrameUpdate>,
    debug: bool,
    token: &CancellationToken,
) {
    let mut buf = [0u8; REPORT_LEN];

    loop {
        if token.is_cancelled() {
            info!("Reader received stop request, shutting down.");
            break;
        }

        let read = match device.read_timeout(&mut buf, READ_TIMEOUT_MS) {
            Ok(n) => n,
            Err(e) => {
                // Device unplugged or hidraw fault: fatal for this session.
                error!("Keyboard read failed, ending session: {e}");
                break;
            }
        };
        if read == 0 {
            continue; // timeout tick, loop back to the cancellation check
        }

        let sample = match parse_report(&buf[..read]) {
            Some(sample) => sample,
            None => continue, // heartbeat or non-analog traffic
        };

        let (frame, deadzone) = {
            let cfg = config.lock().unwrap();
            let settings = cfg.settings;

            active.update(sample.key_id, sample.pressure, settings.deadzone);
            if let Some(detected) = latch.observe(sample.key_id, sample.pressure, settings.deadzone)
            {
                info!(
                    "Detected key {} (id {}, raw {})",
                    key_display(detected.key_id),
                    detected.key_id,
                    detected.pressure
                );
            }

            (
                build_frame(&active.snapshot(), &cfg.mappings, &settings),
                settings.deadzone,
            )
        };

        if let Err(e) = pad.submit_frame(&frame) {
            error!("Virtual pad write failed, ending session: {e}");
            break;
        }

        // Only meaningful presses are worth log noise.
        if debug && sample.pressure > deadzone {
            debug!(
                "key={} raw={} active={}",
                key_display(sample.key_id),
                sample.pressure,
                active.len()
            );
        }

        // Fire-and-forget: replaces the previous value, never blocks on
        // however slowly the consumer drains it.
        frame_tx.send_replace(FrameUpdate {
            frame,
            key_id: sample.key_id,
            raw_pressure: sample.pressure,
            active_count: active.len(),
        });
    }

    // Whatever ends the session, the outside world sees a released pad and
    // an empty table, so a reconnect starts from zero.
    active.clear();
    if let Err(e) = pad.release_all() {
        warn!("Could not release pad state on teardown: {e}");
    }
}

/// Aux task: print every parsed analog sample until cancelled.
pub fn run_monitor(token: &CancellationToken) -> Result<()> {
    let api = HidApi::new().context("Failed to initialize hidapi")?;
    let device = open_keyboard(&api)?;
    let mut buf = [0u8; REPORT_LEN];

    info!("Monitoring analog reports, press Ctrl+C to stop...");
    while !token.is_cancelled() {
        let read = device
            .read_timeout(&mut buf, READ_TIMEOUT_MS)
            .context("Keyboard read failed")?;
        if read == 0 {
            continue;
        }
        if let Some(sample) = parse_report(&buf[..read]) {
            info!(
                "[{}] id={} raw={}",
                key_display(sample.key_id),
                sample.key_id,
                sample.pressure
            );
        }
    }
    Ok(())
}
