//! In-memory platform for tests
//!
//! Monitors, DPI answers and realized scales are scripted; every surface
//! creation, presentation and teardown is recorded for assertions.

use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{
    HookHandle, Monitor, MonitorId, PhysicalRect, Platform, PlatformEvent, PointerSink,
    ScreenPoint, Surface,
};
use crate::dpi::DpiScale;
use crate::geometry::FrameGeometry;
use crate::monitor::{MonitorContext, VisualState};

#[derive(Debug, Clone)]
pub struct Presented {
    pub monitor: MonitorId,
    pub geometry: Arc<FrameGeometry>,
    pub visual: VisualState,
    pub scale: DpiScale,
}

#[derive(Default)]
struct FakeState {
    monitors: Vec<Monitor>,
    dpi: HashMap<MonitorId, Option<(f64, f64)>>,
    realized: HashMap<MonitorId, DpiScale>,
    failing_surfaces: HashSet<MonitorId>,
    capture_exclusion_fails: bool,
    hook_fails: bool,
    live_surfaces: Vec<MonitorId>,
    excluded: Vec<MonitorId>,
    presented: Vec<Presented>,
    events: Option<mpsc::UnboundedSender<PlatformEvent>>,
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Rc<RefCell<FakeState>>,
    sink: Arc<Mutex<Option<PointerSink>>>,
}

/// `count` monitors of 1920x1080 side by side; the first is primary
pub fn side_by_side(count: u32) -> Vec<Monitor> {
    (0..count)
        .map(|i| {
            let bounds = PhysicalRect::new(i as i32 * 1920, 0, 1920, 1080);
            Monitor {
                id: MonitorId(i),
                name: format!("FAKE-{i}"),
                bounds,
                working_area: bounds,
                primary: i == 0,
            }
        })
        .collect()
}

impl FakePlatform {
    pub fn with_monitors(count: u32) -> Self {
        let platform = Self::default();
        platform.set_monitors(side_by_side(count));
        platform
    }

    /// Replace the topology. New monitors answer 96 DPI.
    pub fn set_monitors(&self, monitors: Vec<Monitor>) {
        let mut state = self.state.borrow_mut();
        for monitor in &monitors {
            state.dpi.entry(monitor.id).or_insert(Some((96.0, 96.0)));
        }
        state.monitors = monitors;
    }

    /// `None` makes the lookup fail
    pub fn set_dpi(&self, monitor: MonitorId, dpi: Option<(f64, f64)>) {
        self.state.borrow_mut().dpi.insert(monitor, dpi);
    }

    pub fn set_realized(&self, monitor: MonitorId, scale: DpiScale) {
        self.state.borrow_mut().realized.insert(monitor, scale);
    }

    pub fn fail_surface(&self, monitor: MonitorId) {
        self.state.borrow_mut().failing_surfaces.insert(monitor);
    }

    pub fn fail_capture_exclusion(&self) {
        self.state.borrow_mut().capture_exclusion_fails = true;
    }

    pub fn fail_hook(&self) {
        self.state.borrow_mut().hook_fails = true;
    }

    /// Feed a pointer sample through the installed hook
    pub fn move_pointer(&self, point: ScreenPoint) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => {
                sink.deliver(point);
                true
            }
            None => false,
        }
    }

    pub fn hook_installed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub fn emit(&self, event: PlatformEvent) {
        if let Some(events) = self.state.borrow().events.as_ref() {
            let _ = events.send(event);
        }
    }

    pub fn live_surfaces(&self) -> Vec<MonitorId> {
        let mut live = self.state.borrow().live_surfaces.clone();
        live.sort();
        live
    }

    pub fn excluded(&self) -> Vec<MonitorId> {
        self.state.borrow().excluded.clone()
    }

    pub fn presented(&self) -> Vec<Presented> {
        self.state.borrow().presented.clone()
    }

    pub fn last_presented(&self, monitor: MonitorId) -> Option<Presented> {
        self.state
            .borrow()
            .presented
            .iter()
            .rev()
            .find(|p| p.monitor == monitor)
            .cloned()
    }

    pub fn clear_presented(&self) {
        self.state.borrow_mut().presented.clear();
    }
}

pub struct FakeSurface {
    monitor: MonitorId,
    state: Rc<RefCell<FakeState>>,
}

impl Surface for FakeSurface {
    fn exclude_from_capture(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.capture_exclusion_fails {
            bail!("capture exclusion not supported");
        }
        state.excluded.push(self.monitor);
        Ok(())
    }

    fn realized_scale(&self) -> Option<DpiScale> {
        self.state.borrow().realized.get(&self.monitor).copied()
    }

    fn place(&mut self, _area: PhysicalRect) -> Result<()> {
        Ok(())
    }

    fn present(&mut self, context: &MonitorContext) -> Result<()> {
        self.state.borrow_mut().presented.push(Presented {
            monitor: self.monitor,
            geometry: Arc::clone(context.geometry()),
            visual: context.visual,
            scale: context.scale(),
        });
        Ok(())
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.live_surfaces.iter().position(|id| *id == self.monitor) {
            state.live_surfaces.remove(pos);
        }
    }
}

struct FakeHook {
    sink: Arc<Mutex<Option<PointerSink>>>,
}

impl HookHandle for FakeHook {
    fn uninstall(self: Box<Self>) {
        self.sink.lock().unwrap().take();
    }
}

impl Platform for FakePlatform {
    type Surface = FakeSurface;

    fn monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.state.borrow().monitors.clone())
    }

    fn monitor_dpi(&self, monitor: MonitorId) -> Result<(f64, f64)> {
        self.state
            .borrow()
            .dpi
            .get(&monitor)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("no DPI for monitor {monitor}"))
    }

    fn create_surface(&self, monitor: &Monitor) -> Result<FakeSurface> {
        let mut state = self.state.borrow_mut();
        if state.failing_surfaces.contains(&monitor.id) {
            bail!("surface creation refused for {}", monitor.id);
        }
        state.live_surfaces.push(monitor.id);
        Ok(FakeSurface {
            monitor: monitor.id,
            state: Rc::clone(&self.state),
        })
    }

    fn install_pointer_hook(&self, sink: PointerSink) -> Result<Box<dyn HookHandle>> {
        if self.state.borrow().hook_fails {
            bail!("input capture denied");
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(FakeHook {
            sink: Arc::clone(&self.sink),
        }))
    }

    fn forward_events(&self, events: mpsc::UnboundedSender<PlatformEvent>) -> Result<()> {
        self.state.borrow_mut().events = Some(events);
        Ok(())
    }
}
