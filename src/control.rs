//! POSIX signal listener for runtime control
//!
//! `kill -USR1` toggles the light, `kill -USR2` toggles the frame on all
//! monitors, SIGINT/SIGTERM stop the daemon.

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    ToggleLight,
    ToggleAllMonitors,
    Stop,
}

fn command_for(signal: i32) -> Option<ControlCommand> {
    match signal {
        SIGUSR1 => Some(ControlCommand::ToggleLight),
        SIGUSR2 => Some(ControlCommand::ToggleAllMonitors),
        SIGINT | SIGTERM => Some(ControlCommand::Stop),
        _ => None,
    }
}

/// Spawn the signal thread. It exits once the receiver is gone.
pub fn spawn_listener(sender: UnboundedSender<ControlCommand>) -> Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGUSR1, SIGUSR2, SIGINT, SIGTERM])
        .context("Failed to register control signal handlers")?;
    info!("Control signals registered (USR1: light, USR2: all monitors)");

    thread::Builder::new()
        .name("control-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                let Some(command) = command_for(signal) else {
                    continue;
                };
                debug!(signal, command = ?command, "Control signal received");
                if sender.send(command).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn control signal thread")
}
