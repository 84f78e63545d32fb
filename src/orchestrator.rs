//! Monitor window orchestration
//!
//! Keeps one frame window per covered monitor: the primary window on the
//! current monitor, plus secondary windows when "show on all monitors" is on.
//! Also owns the pointer hook and routes pointer samples to the window under
//! the pointer.

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dpi::resolve_scale;
use crate::geometry::FrameStyle;
use crate::hit_test::{collapse, release_pointer, track_pointer};
use crate::lighting::LightingParameters;
use crate::monitor::MonitorContext;
use crate::platform::{Monitor, MonitorId, Platform, ScreenPoint, Surface};
use crate::pointer::PointerHook;

/// Index of the monitor flagged primary, or 0
pub fn primary_index(monitors: &[Monitor]) -> usize {
    monitors.iter().position(|m| m.primary).unwrap_or(0)
}

/// Index of the monitor whose bounds contain `point`
pub fn monitor_index_at(monitors: &[Monitor], point: ScreenPoint) -> Option<usize> {
    monitors.iter().position(|m| m.bounds.contains(point))
}

pub struct MonitorWindow<S> {
    pub context: MonitorContext,
    surface: S,
}

impl<S: Surface> MonitorWindow<S> {
    fn present(&mut self) {
        if let Err(e) = self.surface.present(&self.context) {
            warn!(monitor = %self.context.id(), error = %e, "Failed to present frame");
        }
    }

    /// Adopt the surface's realized scale if it differs from the estimate
    fn reconcile_realized(&mut self) -> bool {
        let Some(realized) = self.surface.realized_scale() else {
            return false;
        };
        if !realized.differs(&self.context.scale()) {
            return false;
        }
        info!(
            monitor = %self.context.id(),
            estimated = ?self.context.scale(),
            realized = ?realized,
            "Realized scale differs from estimate, recomputing frame"
        );
        self.context.rescale(realized);
        true
    }
}

pub struct Orchestrator<P: Platform> {
    platform: P,
    style: FrameStyle,
    primary: Option<MonitorWindow<P::Surface>>,
    secondary: Vec<MonitorWindow<P::Surface>>,
    show_all: bool,
    light_on: bool,
    lighting: LightingParameters,
    hook: Option<PointerHook>,
}

impl<P: Platform> Orchestrator<P> {
    pub fn new(platform: P, style: FrameStyle, light_on: bool) -> Self {
        Self {
            platform,
            style,
            primary: None,
            secondary: Vec::new(),
            show_all: false,
            light_on,
            lighting: LightingParameters::default(),
            hook: None,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn primary(&self) -> Option<&MonitorContext> {
        self.primary.as_ref().map(|w| &w.context)
    }

    pub fn secondary(&self) -> impl Iterator<Item = &MonitorContext> {
        self.secondary.iter().map(|w| &w.context)
    }

    pub fn is_showing_all(&self) -> bool {
        self.show_all
    }

    pub fn is_light_on(&self) -> bool {
        self.light_on
    }

    fn windows_mut(&mut self) -> impl Iterator<Item = &mut MonitorWindow<P::Surface>> {
        self.primary.iter_mut().chain(self.secondary.iter_mut())
    }

    fn open_window(&self, monitor: &Monitor) -> Result<MonitorWindow<P::Surface>> {
        let scale = resolve_scale(&self.platform, monitor.id);
        let mut context = MonitorContext::new(monitor.clone(), scale, self.style);
        context.visual.light_on = self.light_on;
        context.visual.frame_visible = self.light_on;
        context.visual.lighting = self.lighting;

        let mut surface = self
            .platform
            .create_surface(monitor)
            .context(format!("Failed to create frame window on monitor {}", monitor.id))?;
        if let Err(e) = surface.exclude_from_capture() {
            warn!(
                monitor = %monitor.id,
                error = %e,
                "Cannot exclude frame from screen capture, continuing without it"
            );
        }

        let mut window = MonitorWindow { context, surface };
        window.reconcile_realized();
        window.present();
        info!(
            monitor = %monitor.id,
            name = %monitor.name,
            scale = ?window.context.scale(),
            bounds = ?window.context.logical_bounds(),
            "Opened frame window"
        );
        Ok(window)
    }

    /// Put the primary window on `monitors[current_index]`
    pub fn show_primary(&mut self, monitors: &[Monitor], current_index: usize) -> Result<()> {
        let Some(monitor) = monitors.get(current_index) else {
            bail!("Monitor index {current_index} out of range ({} monitors)", monitors.len());
        };
        self.primary = None;
        self.primary = Some(self.open_window(monitor)?);
        Ok(())
    }

    pub fn show_on_all_monitors(&mut self, monitors: &[Monitor], current_index: usize) {
        self.secondary.clear();
        self.show_all = true;
        for (index, monitor) in monitors.iter().enumerate() {
            if index == current_index {
                continue;
            }
            match self.open_window(monitor) {
                Ok(window) => self.secondary.push(window),
                Err(e) => error!(monitor = %monitor.id, error = ?e, "Skipping monitor"),
            }
        }
        info!(count = self.secondary.len(), "Showing frame on all monitors");
    }

    pub fn hide_all_monitors(&mut self) {
        self.show_all = false;
        if !self.secondary.is_empty() {
            info!(count = self.secondary.len(), "Closing secondary frame windows");
            self.secondary.clear();
        }
    }

    /// Push the global on/off state and lighting into every window
    pub fn update_all(&mut self) {
        let (light_on, lighting) = (self.light_on, self.lighting);
        for window in self.windows_mut() {
            window.context.visual.light_on = light_on;
            window.context.visual.lighting = lighting;
            if light_on {
                window.context.visual.frame_visible = true;
            } else {
                collapse(&mut window.context);
            }
            window.present();
        }
    }

    pub fn set_light(&mut self, on: bool) {
        info!(on, "Light toggled");
        self.light_on = on;
        self.update_all();
    }

    pub fn set_lighting(&mut self, lighting: LightingParameters) {
        self.lighting = lighting;
        self.update_all();
    }

    /// Re-check every window's realized scale
    pub fn reconcile_realized(&mut self) {
        for window in self.windows_mut() {
            if window.reconcile_realized() {
                window.present();
            }
        }
    }

    /// DPI changed for `monitor`, or for every monitor when `None`
    pub fn handle_dpi_change(&mut self, monitor: Option<MonitorId>) {
        let platform = &self.platform;
        let windows = self.primary.iter_mut().chain(self.secondary.iter_mut());
        for window in windows {
            if monitor.is_some_and(|id| id != window.context.id()) {
                continue;
            }
            let scale = window
                .surface
                .realized_scale()
                .unwrap_or_else(|| resolve_scale(platform, window.context.id()));
            if scale.differs(&window.context.scale()) {
                info!(monitor = %window.context.id(), scale = ?scale, "Monitor scale changed");
                window.context.rescale(scale);
                window.present();
            }
        }
    }

    pub fn handle_topology_change(&mut self, monitors: &[Monitor]) -> Result<()> {
        info!(count = monitors.len(), "Monitor topology changed");

        let current = self
            .primary
            .as_ref()
            .and_then(|w| monitors.iter().position(|m| m.id == w.context.id()));
        let current = match current {
            Some(index) => {
                if let Some(window) = self.primary.as_mut() {
                    relocate(&self.platform, window, &monitors[index]);
                }
                index
            }
            None => {
                self.primary = None;
                if monitors.is_empty() {
                    self.secondary.clear();
                    warn!("No monitors left, frame hidden");
                    return Ok(());
                }
                let index = primary_index(monitors);
                self.show_primary(monitors, index)?;
                index
            }
        };

        if self.show_all {
            self.show_on_all_monitors(monitors, current);
        } else {
            self.secondary.retain(|w| monitors.iter().any(|m| m.id == w.context.id()));
        }
        Ok(())
    }

    /// Route one pointer sample to the window under it
    pub fn handle_pointer(&mut self, point: ScreenPoint) {
        let mut claimed = false;
        for window in self.windows_mut() {
            let changed = if !claimed && window.context.covers(point) {
                claimed = true;
                let logical = window.context.to_logical(point);
                track_pointer(&mut window.context, logical)
            } else {
                release_pointer(&mut window.context)
            };
            if changed {
                window.present();
            }
        }
    }

    pub fn redraw_all(&mut self) {
        for window in self.windows_mut() {
            window.present();
        }
    }

    pub fn install_pointer_hook(&mut self) -> Result<watch::Receiver<Option<ScreenPoint>>> {
        if self.hook.is_some() {
            bail!("Pointer hook already installed");
        }
        let (hook, samples) = PointerHook::install(&self.platform)?;
        self.hook = Some(hook);
        Ok(samples)
    }

    pub fn has_pointer_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Uninstall the hook and close secondary windows
    pub fn shutdown(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook.uninstall();
        }
        self.hide_all_monitors();
        debug!("Orchestrator shut down");
    }
}

/// Move a window to its monitor's new bounds. A mode change also changes the
/// DPI, so the scale is resolved again.
fn relocate<P: Platform>(platform: &P, window: &mut MonitorWindow<P::Surface>, monitor: &Monitor) {
    if window.context.monitor() == monitor {
        return;
    }
    window.context.relocate(monitor.clone());
    let scale = window
        .surface
        .realized_scale()
        .unwrap_or_else(|| resolve_scale(platform, monitor.id));
    if scale.differs(&window.context.scale()) {
        info!(monitor = %monitor.id, scale = ?scale, "Monitor scale changed with its mode");
        window.context.rescale(scale);
    }
    if let Err(e) = window.surface.place(monitor.working_area) {
        warn!(monitor = %monitor.id, error = %e, "Failed to move frame window");
    }
    window.present();
}
