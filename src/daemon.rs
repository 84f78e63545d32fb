//! Daemon loop: owns every frame window and multiplexes pointer samples,
//! face samples, platform notifications and control commands on one thread.

use anyhow::{bail, Context, Result};
use std::future;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::constants::daemon::SHUTDOWN_GRACE_MS;
use crate::control::{self, ControlCommand};
use crate::face::{FaceSample, FaceSampler, SampleStream};
use crate::lighting::FaceLightingMapper;
use crate::orchestrator::{primary_index, Orchestrator};
use crate::platform::{Platform, PlatformEvent, ScreenPoint};

type PointerSlot = Option<watch::Receiver<Option<ScreenPoint>>>;

/// Run until SIGINT/SIGTERM
pub fn run<P: Platform>(platform: P, settings: &Settings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let _signals = control::spawn_listener(control_tx)?;

    let result = runtime.block_on(run_loop(platform, settings, control_rx));
    shutdown_runtime(runtime);
    result
}

/// Blocking face reads cannot be cancelled; the runtime stops waiting for them
fn shutdown_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(Duration::from_millis(SHUTDOWN_GRACE_MS));
    debug!("Runtime shut down");
}

pub async fn run_loop<P: Platform>(
    platform: P,
    settings: &Settings,
    mut controls: mpsc::UnboundedReceiver<ControlCommand>,
) -> Result<()> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    if let Err(e) = platform.forward_events(event_tx) {
        warn!(error = ?e, "Platform notifications unavailable, topology and DPI changes will be missed");
    }

    let monitors = platform.monitors().context("Failed to enumerate monitors")?;
    if monitors.is_empty() {
        bail!("No monitors found");
    }
    let current = primary_index(&monitors);

    let mut orchestrator = Orchestrator::new(platform, settings.frame_style(), settings.light_on);
    orchestrator
        .show_primary(&monitors, current)
        .context("Failed to show frame on the primary monitor")?;
    if settings.show_on_all_monitors {
        orchestrator.show_on_all_monitors(&monitors, current);
    }

    let mut pointer: PointerSlot = match orchestrator.install_pointer_hook() {
        Ok(samples) => Some(samples),
        Err(e) => {
            error!(error = ?e, "Pointer hook unavailable, frame will not react to the pointer");
            None
        }
    };

    let mut mapper = FaceLightingMapper::new(settings.lighting_config());
    let mut lighting = mapper.subscribe();
    let mut sampler = start_sampler(settings);

    info!(
        monitors = monitors.len(),
        all_monitors = orchestrator.is_showing_all(),
        face_tracking = sampler.is_some(),
        "Daemon running"
    );

    loop {
        tokio::select! {
            moved = next_pointer(&mut pointer) => match moved {
                Ok(Some(point)) => orchestrator.handle_pointer(point),
                Ok(None) => {}
                Err(_) => {
                    warn!("Pointer hook stopped delivering samples");
                    pointer = None;
                }
            },
            sample = next_sample(&mut sampler) => match sample {
                Some(sample) => {
                    mapper.update(&sample);
                }
                None => {
                    warn!("Face sampler ended");
                    sampler = None;
                    mapper.stop();
                }
            },
            Ok(()) = lighting.changed() => {
                let params = *lighting.borrow_and_update();
                orchestrator.set_lighting(params);
            }
            Some(event) = events.recv() => handle_platform_event(&mut orchestrator, event),
            command = controls.recv() => match command {
                Some(ControlCommand::ToggleLight) => {
                    let on = !orchestrator.is_light_on();
                    orchestrator.set_light(on);
                }
                Some(ControlCommand::ToggleAllMonitors) => toggle_all_monitors(&mut orchestrator),
                Some(ControlCommand::Stop) | None => break,
            },
        }
    }

    info!("Stopping");
    orchestrator.shutdown();
    if let Some(sampler) = sampler.take() {
        sampler.stop();
    }
    mapper.stop();
    Ok(())
}

fn start_sampler(settings: &Settings) -> Option<FaceSampler> {
    let path = settings.face_samples.as_deref()?;
    match SampleStream::new(path) {
        Ok(source) => Some(FaceSampler::spawn(source, settings.sample_interval())),
        Err(e) => {
            error!(error = ?e, "Face tracking disabled");
            None
        }
    }
}

async fn next_pointer(slot: &mut PointerSlot) -> Result<Option<ScreenPoint>, watch::error::RecvError> {
    match slot {
        Some(samples) => {
            samples.changed().await?;
            Ok(*samples.borrow_and_update())
        }
        None => future::pending().await,
    }
}

async fn next_sample(sampler: &mut Option<FaceSampler>) -> Option<FaceSample> {
    match sampler {
        Some(sampler) => sampler.recv().await,
        None => future::pending().await,
    }
}

fn handle_platform_event<P: Platform>(orchestrator: &mut Orchestrator<P>, event: PlatformEvent) {
    debug!(event = ?event, "Platform event");
    match event {
        PlatformEvent::TopologyChanged => {
            let result = orchestrator
                .platform()
                .monitors()
                .and_then(|monitors| orchestrator.handle_topology_change(&monitors));
            if let Err(e) = result {
                error!(error = ?e, "Failed to apply monitor topology change");
            }
        }
        PlatformEvent::DpiChanged(monitor) => orchestrator.handle_dpi_change(monitor),
        PlatformEvent::Redraw => {
            orchestrator.reconcile_realized();
            orchestrator.redraw_all();
        }
    }
}

fn toggle_all_monitors<P: Platform>(orchestrator: &mut Orchestrator<P>) {
    if orchestrator.is_showing_all() {
        orchestrator.hide_all_monitors();
        return;
    }
    let monitors = match orchestrator.platform().monitors() {
        Ok(monitors) => monitors,
        Err(e) => {
            error!(error = ?e, "Failed to enumerate monitors");
            return;
        }
    };
    let current = orchestrator
        .primary()
        .and_then(|primary| monitors.iter().position(|m| m.id == primary.id()))
        .unwrap_or_else(|| primary_index(&monitors));
    orchestrator.show_on_all_monitors(&monitors, current);
}
