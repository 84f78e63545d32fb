//! Per-monitor DPI scale resolution
//!
//! Lookups never fail the caller: anything the platform cannot answer falls
//! back to a scale of 1.0.

use tracing::{debug, warn};

use crate::constants::dpi::{BASE_DPI, SCALE_EPSILON};
use crate::geometry::{Point, Rect};
use crate::platform::{MonitorId, PhysicalRect, Platform};

/// Device pixels per logical unit, per axis. Always positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpiScale {
    pub x: f64,
    pub y: f64,
}

impl Default for DpiScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DpiScale {
    pub const IDENTITY: DpiScale = DpiScale { x: 1.0, y: 1.0 };

    /// Scale for the given DPI pair, or identity if either value is unusable
    pub fn from_dpi(dpi_x: f64, dpi_y: f64) -> Self {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(dpi_x) && valid(dpi_y) {
            Self {
                x: dpi_x / BASE_DPI,
                y: dpi_y / BASE_DPI,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// True when either axis moved by more than the reconciliation epsilon
    pub fn differs(&self, other: &DpiScale) -> bool {
        (self.x - other.x).abs() > SCALE_EPSILON || (self.y - other.y).abs() > SCALE_EPSILON
    }

    pub fn to_logical_rect(&self, rect: PhysicalRect) -> Rect {
        Rect::new(
            f64::from(rect.x) / self.x,
            f64::from(rect.y) / self.y,
            f64::from(rect.width) / self.x,
            f64::from(rect.height) / self.y,
        )
    }

    /// Screen pixel position relative to `origin`, in logical units
    pub fn to_logical_point(&self, origin: PhysicalRect, sx: i32, sy: i32) -> Point {
        Point::new(
            f64::from(sx - origin.x) / self.x,
            f64::from(sy - origin.y) / self.y,
        )
    }

    pub fn to_physical_x(&self, logical: f64) -> f64 {
        logical * self.x
    }

    pub fn to_physical_y(&self, logical: f64) -> f64 {
        logical * self.y
    }
}

/// Resolve the scale of `monitor`, falling back to identity on any failure
pub fn resolve_scale<P: Platform>(platform: &P, monitor: MonitorId) -> DpiScale {
    match platform.monitor_dpi(monitor) {
        Ok((dpi_x, dpi_y)) => {
            let scale = DpiScale::from_dpi(dpi_x, dpi_y);
            debug!(monitor = %monitor, dpi_x, dpi_y, scale = ?scale, "Resolved monitor scale");
            scale
        }
        Err(e) => {
            warn!(monitor = %monitor, error = %e, "DPI lookup failed, using scale 1.0");
            DpiScale::IDENTITY
        }
    }
}
