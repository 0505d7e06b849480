//! Top-level orchestration: the bridge run loop, aux maintenance tasks, and
//! system preflight checks.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use log::{error, info, warn};

use crate::config::{ConfigManager, SharedConfig};
use crate::detect::DetectionLatch;
use crate::keyboard::{self, KeyboardManager};
use crate::keys::key_display;
use crate::report::{parse_report, REPORT_LEN};

#[derive(Subcommand, Clone)]
pub enum AuxDriverTask {
    /// List the keyboard's HID interfaces.
    EnumDevices,
    /// Print parsed analog samples as they arrive.
    Monitor,
    /// Wait for one key press and print its id, for building bindings.
    Detect,
    /// Load the config file and report problems.
    ValidateConfig,
}

fn load_config(cfg_file_path: &Path, debug: bool) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(cfg_file_path, debug);
    manager.load()?;
    for warning in manager.validate() {
        warn!("Config: {warning}");
    }
    Ok(manager)
}

pub async fn run_aux_task(aux_task: &AuxDriverTask, cfg_file_path: &Path, debug: bool) -> Result<()> {
    match aux_task {
        AuxDriverTask::EnumDevices => {
            let api = hidapi::HidApi::new().context("Failed to initialize hidapi")?;
            let interfaces = keyboard::enumerate_interfaces(&api);
            if interfaces.is_empty() {
                bail!(
                    "No keyboard interfaces found (VID {:04X} PID {:04X}).",
                    keyboard::KEYBOARD_VID,
                    keyboard::KEYBOARD_PID
                );
            }
            info!("Keyboard interfaces:");
            for iface in interfaces {
                info!(
                    "> interface {}: {} @ {}",
                    iface.interface_number, iface.product, iface.path
                );
            }
        }
        AuxDriverTask::Monitor => {
            let token = tokio_util::sync::CancellationToken::new();
            let monitor_token = token.child_token();
            let monitor =
                tokio::task::spawn_blocking(move || keyboard::run_monitor(&monitor_token));
            tokio::signal::ctrl_c().await?;
            token.cancel();
            monitor.await??;
        }
        AuxDriverTask::Detect => {
            let config = load_config(cfg_file_path, debug)?;
            let deadzone = config.get_config().settings.deadzone;
            run_detect_once(deadzone)?;
        }
        AuxDriverTask::ValidateConfig => {
            let mut manager = ConfigManager::new(cfg_file_path, debug);
            manager.load()?;
            let warnings = manager.validate();
            if warnings.is_empty() {
                info!("Configuration is valid.");
            } else {
                error!("Configuration problems:");
                for warning in &warnings {
                    error!("> {warning}");
                }
                bail!("Configuration validation failed");
            }
        }
    }
    Ok(())
}

/// Standalone detection pass: arm the latch, read until the first
/// qualifying press, print it, done.
fn run_detect_once(deadzone: u16) -> Result<()> {
    let api = hidapi::HidApi::new().context("Failed to initialize hidapi")?;
    let device = keyboard::open_keyboard(&api)?;
    let latch = DetectionLatch::new();
    latch.arm();

    info!("Detection armed: press a key on the keyboard...");
    let mut buf = [0u8; REPORT_LEN];
    loop {
        let read = device
            .read_timeout(&mut buf, 200)
            .context("Keyboard read failed")?;
        if read == 0 {
            continue;
        }
        let Some(sample) = parse_report(&buf[..read]) else {
            continue;
        };
        if let Some(detected) = latch.observe(sample.key_id, sample.pressure, deadzone) {
            info!(
                "Detected key {} (id {}, raw {}). Use \"{}\" as the binding key in the config.",
                key_display(detected.key_id),
                detected.key_id,
                detected.pressure,
                detected.key_id
            );
            return Ok(());
        }
    }
}

fn watch_config_file(cfg_file_path: &Path) -> Result<tokio::sync::mpsc::Receiver<()>> {
    use notify_debouncer_full::{new_debouncer, DebounceEventResult};

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut debouncer = new_debouncer(
        std::time::Duration::from_millis(500),
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.blocking_send(());
                        break;
                    }
                }
            }
            Err(e) => error!("Config file watch error: {:?}", e),
        },
    )?;

    debouncer.watch(
        cfg_file_path,
        notify_debouncer_full::notify::RecursiveMode::NonRecursive,
    )?;

    std::mem::forget(debouncer);

    Ok(rx)
}

/// Swap a freshly validated config into the shared slot, or keep the old
/// one if the new file does not load.
fn hot_reload_config(cfg_file_path: &Path, shared: &SharedConfig, debug: bool) {
    match load_config(cfg_file_path, debug) {
        Ok(manager) => {
            *shared.lock().unwrap() = manager.get_config().clone();
            info!("Configuration reloaded.");
        }
        Err(e) => {
            error!("Configuration reload failed: {e:?}");
            warn!("Running with the previous (valid) configuration.");
        }
    }
}

pub async fn run_bridge(cfg_file_path: &Path, no_hot_reload: bool, debug: bool) -> Result<()> {
    let shared = load_config(cfg_file_path, debug)?.into_shared();

    {
        let cfg = shared.lock().unwrap();
        info!("Active bindings: {}", cfg.mappings.len());
        if cfg.mappings.is_empty() {
            warn!("No key bindings configured - the pad will stay idle.");
            warn!("Run the 'detect' subcommand to find key ids, then add bindings to the config.");
        }
    }

    let mut config_watcher = if !no_hot_reload && cfg_file_path.exists() {
        Some(watch_config_file(cfg_file_path)?)
    } else {
        None
    };

    let mut manager = KeyboardManager::new(shared.clone(), debug);
    manager.start()?;
    let mut session_end = manager.subscribe_session_end();

    // Consumer side of the frame slot: trails the reader at its own pace,
    // skipping straight to the latest frame if it falls behind.
    if debug {
        let mut frames = manager.subscribe_frames();
        tokio::spawn(async move {
            while frames.changed().await.is_ok() {
                let update = frames.borrow_and_update().clone();
                log::debug!(
                    "frame: lx={} ly={} rx={} ry={} lt={} rt={} buttons={:?} (key={} raw={} active={})",
                    update.frame.left_x,
                    update.frame.left_y,
                    update.frame.right_x,
                    update.frame.right_y,
                    update.frame.left_trigger,
                    update.frame.right_trigger,
                    update.frame.buttons,
                    key_display(update.key_id),
                    update.raw_pressure,
                    update.active_count,
                );
            }
        });
    }

    if !no_hot_reload {
        info!(
            "{} {}.",
            "Hot-reload on configuration file change is active".magenta().bold(),
            "(disable with --no-hot-reload)"
        );
    }
    info!("{}", "Press Ctrl+C to stop.".green().bold());
    info!("{}", "=".repeat(50));

    loop {
        #[rustfmt::skip]
        tokio::select! {
            _ = session_end.changed() => {
                if *session_end.borrow() {
                    error!("Keyboard session ended (device unplugged or read failure).");
                    manager.stop().await;
                    bail!("Session ended unexpectedly");
                }
            }
            _ = async {
                match config_watcher.as_mut() {
                    Some(rx) => { let _ = rx.recv().await; }
                    None => std::future::pending().await,
                }
            } => {
                hot_reload_config(cfg_file_path, &shared, debug);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, stopping the bridge.");
                manager.stop().await;
                info!("Cleanup complete, terminating.");
                return Ok(());
            }
        }
    }
}

pub fn check_linux_system_requirements() -> Result<()> {
    if !std::path::Path::new("/dev/uinput").exists() {
        error!("/dev/uinput not found. The virtual gamepad cannot be created.");
        error!("Run: sudo modprobe uinput");
    }

    if !nix::unistd::Uid::current().is_root() {
        let groups = nix::unistd::getgroups()?;
        let input_gid = nix::unistd::Group::from_name("input")?.map(|g| g.gid);

        if let Some(gid) = input_gid {
            if !groups.contains(&gid) {
                warn!("Current user is not in the 'input' group; hidraw reads may fail.");
                warn!("Run: sudo usermod -a -G input $USER");
                warn!("Then logout and login again");
            }
        }
    }

    Ok(())
}
