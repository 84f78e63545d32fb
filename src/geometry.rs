//! Frame geometry engine
//!
//! Pure computation of the rounded-rectangle frame, its proximity bands and
//! the hole-punched variant. Everything here is in logical units and has no
//! knowledge of windows or monitors.

use crate::constants::frame;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset_by(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x - dx, self.y - dy)
    }
}

/// Axis-aligned rectangle. Contains its left/top edges but not its
/// right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.right() && p.y < self.bottom()
    }

    /// True when `other` lies inside this rectangle without touching any edge
    pub fn strictly_contains(&self, other: &Rect) -> bool {
        other.x > self.x
            && other.y > self.y
            && other.right() < self.right()
            && other.bottom() < self.bottom()
    }

    /// True when `other` lies inside this rectangle, edges allowed to touch
    pub fn encloses(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow by `d` on every side
    pub fn inflate(&self, d: f64) -> Rect {
        Rect::new(self.x - d, self.y - d, self.width + 2.0 * d, self.height + 2.0 * d)
    }

    /// Shrink by `d` on every side. A side that would go negative collapses
    /// to zero around the original centre.
    pub fn deflate(&self, d: f64) -> Rect {
        let width = (self.width - 2.0 * d).max(0.0);
        let height = (self.height - 2.0 * d).max(0.0);
        Rect::new(
            self.x + (self.width - width) / 2.0,
            self.y + (self.height - height) / 2.0,
            width,
            height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRect {
    pub rect: Rect,
    pub radius: f64,
}

impl RoundedRect {
    /// Radius is clamped to half the shorter side.
    pub fn new(rect: Rect, radius: f64) -> Self {
        let max_radius = rect.width.min(rect.height) / 2.0;
        Self {
            rect,
            radius: radius.clamp(0.0, max_radius),
        }
    }

    /// Horizontal inset of the rounded outline on row `y`
    fn corner_inset(&self, y: f64) -> f64 {
        let r = self.radius;
        if r <= 0.0 {
            return 0.0;
        }
        let dy = if y < self.rect.y + r {
            self.rect.y + r - y
        } else if y > self.rect.bottom() - r {
            y - (self.rect.bottom() - r)
        } else {
            return 0.0;
        };
        r - (r * r - dy.min(r).powi(2)).sqrt()
    }

    pub fn contains(&self, p: Point) -> bool {
        match self.row_span(p.y) {
            Some((start, end)) => p.x >= start && p.x < end,
            None => false,
        }
    }

    pub fn row_span(&self, y: f64) -> Option<(f64, f64)> {
        if y < self.rect.y || y >= self.rect.bottom() {
            return None;
        }
        let inset = self.corner_inset(y);
        let (start, end) = (self.rect.x + inset, self.rect.right() - inset);
        (end > start).then_some((start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        let (dx, dy) = (p.x - self.center.x, p.y - self.center.y);
        dx * dx + dy * dy < self.radius * self.radius
    }

    pub fn row_span(&self, y: f64) -> Option<(f64, f64)> {
        let dy = y - self.center.y;
        let sq = self.radius * self.radius - dy * dy;
        if sq <= 0.0 {
            return None;
        }
        let half = sq.sqrt();
        Some((self.center.x - half, self.center.x + half))
    }
}

/// The frame ring: outer rounded rect minus inner rounded rect, optionally
/// minus a disc punched at the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub outer: RoundedRect,
    pub inner: RoundedRect,
    pub hole: Option<Circle>,
}

impl FrameGeometry {
    pub fn bounds(&self) -> Rect {
        self.outer.rect
    }

    pub fn is_punched(&self) -> bool {
        self.hole.is_some()
    }

    /// This frame minus `hole`. Any earlier hole is replaced, not accumulated.
    pub fn punched(&self, hole: Circle) -> FrameGeometry {
        FrameGeometry {
            hole: Some(hole),
            ..*self
        }
    }

    pub fn without_hole(&self) -> FrameGeometry {
        FrameGeometry { hole: None, ..*self }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.outer.contains(p)
            && !self.inner.contains(p)
            && !self.hole.is_some_and(|hole| hole.contains(p))
    }

    /// Sorted, disjoint `[start, end)` spans of row `y` covered by the frame
    pub fn row_spans(&self, y: f64) -> Vec<(f64, f64)> {
        let Some(outer) = self.outer.row_span(y) else {
            return Vec::new();
        };
        let mut spans = vec![outer];
        if let Some(cut) = self.inner.row_span(y) {
            spans = subtract_span(spans, cut);
        }
        if let Some(cut) = self.hole.and_then(|hole| hole.row_span(y)) {
            spans = subtract_span(spans, cut);
        }
        spans
    }
}

pub(crate) fn subtract_span(spans: Vec<(f64, f64)>, (cut_start, cut_end): (f64, f64)) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(spans.len() + 1);
    for (start, end) in spans {
        if cut_end <= start || cut_start >= end {
            out.push((start, end));
            continue;
        }
        if cut_start > start {
            out.push((start, cut_start));
        }
        if cut_end < end {
            out.push((cut_end, end));
        }
    }
    out
}

/// Hover trigger bands around the frame, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityRects {
    pub outer: Rect,
    pub inner: Rect,
}

/// Frame dimensions shared by every monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStyle {
    pub thickness: f64,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub hole_radius: f64,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            thickness: frame::DEFAULT_THICKNESS,
            outer_radius: frame::DEFAULT_OUTER_RADIUS,
            inner_radius: frame::DEFAULT_INNER_RADIUS,
            hole_radius: frame::DEFAULT_HOVER_RING_DIAMETER / 2.0,
        }
    }
}

/// Build the frame for a window of `width` x `height`.
///
/// The frame sits inside a fixed margin; the returned geometry is local to its
/// own origin and the offsets place it inside the window.
pub fn compute_frame_geometry(
    width: f64,
    height: f64,
    frame_thickness: f64,
    outer_radius: f64,
    inner_radius: f64,
) -> (FrameGeometry, f64, f64) {
    let adjusted_width = (width - 2.0 * frame::MARGIN).max(0.0);
    let adjusted_height = (height - 2.0 * frame::MARGIN).max(0.0);

    let outer_rect = Rect::new(0.0, 0.0, adjusted_width, adjusted_height);
    let inner_rect = outer_rect.deflate(frame_thickness);

    let geometry = FrameGeometry {
        outer: RoundedRect::new(outer_rect, outer_radius),
        inner: RoundedRect::new(inner_rect, inner_radius),
        hole: None,
    };

    let offset_x = (width - adjusted_width) / 2.0;
    let offset_y = (height - adjusted_height) / 2.0;
    (geometry, offset_x, offset_y)
}

/// Proximity bands for the frame placed at `(offset_x, offset_y)`.
///
/// The outer band reaches `hole_radius` beyond the frame and the inner band
/// stops `hole_radius` short of the inner edge, so hover starts before the
/// pointer crosses the visible edge.
pub fn compute_proximity_rects(
    width: f64,
    height: f64,
    frame_thickness: f64,
    offset_x: f64,
    offset_y: f64,
    hole_radius: f64,
) -> ProximityRects {
    let frame_rect = Rect::new(
        offset_x,
        offset_y,
        width - 2.0 * offset_x,
        height - 2.0 * offset_y,
    );
    ProximityRects {
        outer: frame_rect.inflate(hole_radius),
        inner: frame_rect.deflate(frame_thickness).deflate(hole_radius),
    }
}
