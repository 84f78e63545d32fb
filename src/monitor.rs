//! Per-monitor frame context
//!
//! A [`MonitorContext`] holds everything needed to draw and hit-test the frame
//! on one monitor. Geometry values are immutable and swapped whole; the
//! context is only touched from the daemon loop.

use std::sync::Arc;
use tracing::debug;

use crate::dpi::DpiScale;
use crate::geometry::{
    compute_frame_geometry, compute_proximity_rects, FrameGeometry, FrameStyle, Point,
    ProximityRects, Rect,
};
use crate::lighting::LightingParameters;
use crate::platform::{Monitor, MonitorId, ScreenPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualState {
    pub light_on: bool,
    pub frame_visible: bool,
    /// Hover ring centre in window coordinates, `None` when hidden
    pub hover: Option<Point>,
    pub lighting: LightingParameters,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            light_on: true,
            frame_visible: true,
            hover: None,
            lighting: LightingParameters::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorContext {
    monitor: Monitor,
    style: FrameStyle,
    scale: DpiScale,
    logical_bounds: Rect,
    offset: Point,
    base_geometry: Arc<FrameGeometry>,
    geometry: Arc<FrameGeometry>,
    proximity: ProximityRects,
    pub visual: VisualState,
}

impl MonitorContext {
    pub fn new(monitor: Monitor, scale: DpiScale, style: FrameStyle) -> Self {
        let (logical_bounds, offset, base_geometry, proximity) = layout(&monitor, scale, &style);
        let base_geometry = Arc::new(base_geometry);
        Self {
            monitor,
            style,
            scale,
            logical_bounds,
            offset,
            geometry: Arc::clone(&base_geometry),
            base_geometry,
            proximity,
            visual: VisualState::default(),
        }
    }

    pub fn id(&self) -> MonitorId {
        self.monitor.id
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn style(&self) -> &FrameStyle {
        &self.style
    }

    pub fn scale(&self) -> DpiScale {
        self.scale
    }

    /// Window bounds in logical units (working area / scale)
    pub fn logical_bounds(&self) -> Rect {
        self.logical_bounds
    }

    /// Origin of the frame inside the window
    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn base_geometry(&self) -> &Arc<FrameGeometry> {
        &self.base_geometry
    }

    /// Geometry currently shown, either the base or a hole-punched copy
    pub fn geometry(&self) -> &Arc<FrameGeometry> {
        &self.geometry
    }

    pub fn proximity(&self) -> &ProximityRects {
        &self.proximity
    }

    /// Recompute bounds and geometry for a new scale
    pub fn rescale(&mut self, scale: DpiScale) {
        debug!(monitor = %self.monitor.id, old = ?self.scale, new = ?scale, "Rescaling monitor context");
        self.scale = scale;
        self.relayout();
    }

    /// Monitor moved or its working area changed
    pub fn relocate(&mut self, monitor: Monitor) {
        self.monitor = monitor;
        self.relayout();
    }

    fn relayout(&mut self) {
        let (logical_bounds, offset, base_geometry, proximity) =
            layout(&self.monitor, self.scale, &self.style);
        self.logical_bounds = logical_bounds;
        self.offset = offset;
        self.base_geometry = Arc::new(base_geometry);
        self.geometry = Arc::clone(&self.base_geometry);
        self.proximity = proximity;
        self.visual.hover = None;
    }

    pub fn covers(&self, point: ScreenPoint) -> bool {
        self.monitor.working_area.contains(point)
    }

    /// Screen pixel to window-local logical coordinates
    pub fn to_logical(&self, point: ScreenPoint) -> Point {
        self.scale
            .to_logical_point(self.monitor.working_area, point.x, point.y)
    }

    pub(crate) fn set_geometry(&mut self, geometry: Arc<FrameGeometry>) {
        self.geometry = geometry;
    }

    /// Put the base geometry back. Returns false when it was already shown.
    pub(crate) fn restore_base_geometry(&mut self) -> bool {
        if Arc::ptr_eq(&self.geometry, &self.base_geometry) {
            return false;
        }
        self.geometry = Arc::clone(&self.base_geometry);
        true
    }
}

fn layout(
    monitor: &Monitor,
    scale: DpiScale,
    style: &FrameStyle,
) -> (Rect, Point, FrameGeometry, ProximityRects) {
    let logical_bounds = scale.to_logical_rect(monitor.working_area);
    let (width, height) = (logical_bounds.width, logical_bounds.height);
    let (geometry, offset_x, offset_y) = compute_frame_geometry(
        width,
        height,
        style.thickness,
        style.outer_radius,
        style.inner_radius,
    );
    let proximity = compute_proximity_rects(
        width,
        height,
        style.thickness,
        offset_x,
        offset_y,
        style.hole_radius,
    );
    (logical_bounds, Point::new(offset_x, offset_y), geometry, proximity)
}
