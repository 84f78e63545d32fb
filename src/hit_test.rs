//! Pointer hit-testing and hole punching
//!
//! Classifies a logical pointer position against a context's proximity bands
//! and swaps in the matching geometry. Every function returns whether anything
//! visible changed, so callers only repaint when needed.

use std::sync::Arc;

use crate::geometry::{Circle, Point, ProximityRects};
use crate::monitor::MonitorContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerZone {
    /// Between the outer and inner proximity rects
    FrameBand,
    /// Just inside the inner proximity rect, within one hole radius of it
    NearFromInside,
    Away,
}

impl PointerZone {
    pub fn is_over_frame(self) -> bool {
        !matches!(self, PointerZone::Away)
    }
}

pub fn classify(proximity: &ProximityRects, hole_radius: f64, point: Point) -> PointerZone {
    let in_outer = proximity.outer.contains(point);
    let in_inner = proximity.inner.contains(point);
    let inner_core = proximity.inner.deflate(hole_radius);

    if in_outer && !in_inner {
        PointerZone::FrameBand
    } else if in_inner && !inner_core.contains(point) {
        PointerZone::NearFromInside
    } else {
        PointerZone::Away
    }
}

/// Pointer at `point` (window-local logical units) over this context
pub fn track_pointer(ctx: &mut MonitorContext, point: Point) -> bool {
    if !ctx.visual.light_on {
        return collapse(ctx);
    }

    let hole_radius = ctx.style().hole_radius;
    if !classify(ctx.proximity(), hole_radius, point).is_over_frame() {
        return release_pointer(ctx);
    }

    let offset = ctx.offset();
    let hole_center = point.offset_by(offset.x, offset.y);
    let already_punched = ctx.visual.hover == Some(point)
        && ctx.visual.frame_visible
        && ctx.geometry().hole.map(|hole| hole.center) == Some(hole_center);
    if already_punched {
        return false;
    }

    let punched = ctx
        .base_geometry()
        .punched(Circle::new(hole_center, hole_radius));
    ctx.set_geometry(Arc::new(punched));
    ctx.visual.hover = Some(point);
    ctx.visual.frame_visible = true;
    true
}

/// Pointer is not near this context's frame
pub fn release_pointer(ctx: &mut MonitorContext) -> bool {
    if !ctx.visual.light_on {
        return collapse(ctx);
    }
    let mut changed = ctx.visual.hover.take().is_some();
    if !ctx.visual.frame_visible {
        ctx.visual.frame_visible = true;
        changed = true;
    }
    ctx.restore_base_geometry() || changed
}

/// Light is off: hide frame and hover ring, drop any hole
pub fn collapse(ctx: &mut MonitorContext) -> bool {
    let mut changed = ctx.visual.hover.take().is_some();
    if ctx.visual.frame_visible {
        ctx.visual.frame_visible = false;
        changed = true;
    }
    ctx.restore_base_geometry() || changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpi::DpiScale;
    use crate::geometry::FrameStyle;
    use crate::platform::{Monitor, MonitorId, PhysicalRect};

    // 1920x1080 logical window: frame spans 20..1900 x 20..1060,
    // outer proximity -50..1970 x -50..1130, inner proximity 170..1750 x 170..910,
    // inner core 240..1680 x 240..840
    fn context() -> MonitorContext {
        let bounds = PhysicalRect::new(0, 0, 1920, 1080);
        MonitorContext::new(
            Monitor {
                id: MonitorId(1),
                name: "HDMI-1".to_string(),
                bounds,
                working_area: bounds,
                primary: true,
            },
            DpiScale::IDENTITY,
            FrameStyle::default(),
        )
    }

    #[test]
    fn test_classify_zones() {
        let ctx = context();
        let prox = ctx.proximity();
        assert_eq!(classify(prox, 70.0, Point::new(60.0, 500.0)), PointerZone::FrameBand);
        // Outside the visible frame but inside the outer band
        assert_eq!(classify(prox, 70.0, Point::new(5.0, 500.0)), PointerZone::FrameBand);
        assert_eq!(classify(prox, 70.0, Point::new(200.0, 500.0)), PointerZone::NearFromInside);
        assert_eq!(classify(prox, 70.0, Point::new(960.0, 540.0)), PointerZone::Away);
    }

    #[test]
    fn test_pointer_over_frame_punches_hole() {
        let mut ctx = context();
        assert!(track_pointer(&mut ctx, Point::new(60.0, 500.0)));
        assert_eq!(ctx.visual.hover, Some(Point::new(60.0, 500.0)));
        let hole = ctx.geometry().hole.unwrap();
        assert_eq!(hole.center, Point::new(40.0, 480.0));
        assert_eq!(hole.radius, 70.0);
        assert!(!ctx.geometry().contains(Point::new(40.0, 480.0)));
        assert!(ctx.base_geometry().contains(Point::new(40.0, 480.0)));
    }

    #[test]
    fn test_identical_samples_keep_same_geometry() {
        let mut ctx = context();
        track_pointer(&mut ctx, Point::new(60.0, 500.0));
        let first = Arc::clone(ctx.geometry());
        assert!(!track_pointer(&mut ctx, Point::new(60.0, 500.0)));
        assert!(Arc::ptr_eq(&first, ctx.geometry()));

        // A different point swaps in a new value
        assert!(track_pointer(&mut ctx, Point::new(61.0, 500.0)));
        assert!(!Arc::ptr_eq(&first, ctx.geometry()));
    }

    #[test]
    fn test_leaving_frame_restores_base() {
        let mut ctx = context();
        track_pointer(&mut ctx, Point::new(60.0, 500.0));
        assert!(track_pointer(&mut ctx, Point::new(960.0, 540.0)));
        assert_eq!(ctx.visual.hover, None);
        assert!(Arc::ptr_eq(ctx.geometry(), ctx.base_geometry()));
    }

    #[test]
    fn test_pointer_at_rest_is_noop() {
        let mut ctx = context();
        let base = Arc::clone(ctx.geometry());
        assert!(!track_pointer(&mut ctx, Point::new(960.0, 540.0)));
        assert!(!release_pointer(&mut ctx));
        assert!(Arc::ptr_eq(&base, ctx.geometry()));
    }

    #[test]
    fn test_light_off_collapses_frame() {
        let mut ctx = context();
        track_pointer(&mut ctx, Point::new(60.0, 500.0));
        ctx.visual.light_on = false;

        assert!(track_pointer(&mut ctx, Point::new(60.0, 500.0)));
        assert!(!ctx.visual.frame_visible);
        assert_eq!(ctx.visual.hover, None);
        assert!(Arc::ptr_eq(ctx.geometry(), ctx.base_geometry()));

        // Already collapsed
        assert!(!track_pointer(&mut ctx, Point::new(70.0, 500.0)));
    }

    #[test]
    fn test_light_back_on_restores_visibility() {
        let mut ctx = context();
        ctx.visual.light_on = false;
        collapse(&mut ctx);
        ctx.visual.light_on = true;
        assert!(release_pointer(&mut ctx));
        assert!(ctx.visual.frame_visible);
    }
}
