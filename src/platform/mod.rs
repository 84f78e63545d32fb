//! Platform capability layer
//!
//! Everything the core needs from the OS (monitor topology, DPI, frame
//! surfaces, the global pointer hook and change notifications) goes through
//! the [`Platform`] and [`Surface`] traits. The core never talks to a display
//! server directly.

#[cfg(test)]
pub mod fake;
pub mod x11;

use anyhow::Result;
use std::fmt;
use tokio::sync::{mpsc, watch};

use crate::dpi::DpiScale;
use crate::monitor::MonitorContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub u32);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rectangle in physical screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PhysicalRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn contains(&self, point: ScreenPoint) -> bool {
        let (x, y) = (i64::from(point.x), i64::from(point.y));
        x >= i64::from(self.x) && y >= i64::from(self.y) && x < self.right() && y < self.bottom()
    }

    /// Overlap of both rectangles, `None` when they do not overlap
    pub fn intersect(&self, other: &PhysicalRect) -> Option<PhysicalRect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= i64::from(left) || bottom <= i64::from(top) {
            return None;
        }
        Some(PhysicalRect::new(
            left,
            top,
            (right - i64::from(left)) as u32,
            (bottom - i64::from(top)) as u32,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub bounds: PhysicalRect,
    /// Bounds minus panels/docks reserved by the desktop
    pub working_area: PhysicalRect,
    pub primary: bool,
}

/// Notifications a backend forwards to the daemon loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Monitors were added, removed or moved
    TopologyChanged,
    /// DPI changed for one monitor, or for all when `None`
    DpiChanged(Option<MonitorId>),
    /// Surface contents need repainting
    Redraw,
}

/// Producer side of the pointer slot. The hook only ever overwrites the
/// latest position; the daemon loop reads whatever is newest.
#[derive(Clone)]
pub struct PointerSink(watch::Sender<Option<ScreenPoint>>);

impl PointerSink {
    pub fn new() -> (Self, watch::Receiver<Option<ScreenPoint>>) {
        let (tx, rx) = watch::channel(None);
        (Self(tx), rx)
    }

    pub fn deliver(&self, point: ScreenPoint) {
        self.0.send_replace(Some(point));
    }
}

/// An installed OS-level pointer hook
pub trait HookHandle: Send {
    /// Stop delivering samples. Returns once no further delivery can happen.
    fn uninstall(self: Box<Self>);
}

/// One on-screen frame window. Dropping it destroys the window.
pub trait Surface {
    /// Keep the window out of screen captures
    fn exclude_from_capture(&mut self) -> Result<()>;

    /// Scale the window actually ended up with, once known
    fn realized_scale(&self) -> Option<DpiScale>;

    /// Move/resize to the given physical area
    fn place(&mut self, area: PhysicalRect) -> Result<()>;

    /// Show the context's current geometry and visual state
    fn present(&mut self, context: &MonitorContext) -> Result<()>;
}

pub trait Platform {
    type Surface: Surface;

    fn monitors(&self) -> Result<Vec<Monitor>>;

    /// Raw `(dpi_x, dpi_y)` of a monitor
    fn monitor_dpi(&self, monitor: MonitorId) -> Result<(f64, f64)>;

    fn create_surface(&self, monitor: &Monitor) -> Result<Self::Surface>;

    fn install_pointer_hook(&self, sink: PointerSink) -> Result<Box<dyn HookHandle>>;

    /// Start forwarding topology/DPI/redraw notifications
    fn forward_events(&self, events: mpsc::UnboundedSender<PlatformEvent>) -> Result<()>;
}
