//! Shaped, click-through frame window on one monitor

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::shape::{self, ConnectionExt as ShapeExt};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::x11;
use crate::dpi::DpiScale;
use crate::geometry::{subtract_span, Circle, Point};
use crate::monitor::MonitorContext;
use crate::platform::{Monitor, PhysicalRect, Surface};
use crate::x11_utils::{xft_dpi, CachedAtoms};

/// Root window attributes a frame window is created against
#[derive(Debug, Clone, Copy)]
pub struct ScreenInfo {
    pub root: Window,
    pub depth: u8,
    pub visual: Visualid,
}

#[derive(Debug)]
pub struct FrameWindow {
    pub window: Window,
    name: String,
    area: PhysicalRect,
    mapped: bool,
    physical_size_known: bool,
    rgb: u32,
    gc: Gcontext,
    root: Window,
    opacity_atom: Atom,
    conn: Arc<RustConnection>,
}

impl FrameWindow {
    fn create_window(
        conn: &RustConnection,
        screen: ScreenInfo,
        monitor: &Monitor,
        rgb: u32,
    ) -> Result<Window> {
        let area = monitor.working_area;
        let (x, y, width, height) = (coord(area.x), coord(area.y), extent(area.width), extent(area.height));
        if i32::from(x) != area.x || i32::from(y) != area.y
            || u32::from(width) != area.width || u32::from(height) != area.height
        {
            warn!(monitor = %monitor.name, area = ?area, "Working area exceeds X11 coordinate range, clamping");
        }
        let window = conn.generate_id()
            .context("Failed to generate X11 window ID")?;
        conn.create_window(
            screen.depth,
            window,
            screen.root,
            x,
            y,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.visual,
            &CreateWindowAux::new()
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .background_pixel(rgb)
                .event_mask(EventMask::EXPOSURE),
        )
        .context(format!("Failed to create frame window on '{}'", monitor.name))?;
        Ok(window)
    }

    /// WM_CLASS, always-on-top and an empty input region
    fn setup_window_properties(
        conn: &RustConnection,
        atoms: &CachedAtoms,
        window: Window,
        name: &str,
    ) -> Result<()> {
        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            x11::WM_CLASS,
        )
        .context(format!("Failed to set WM_CLASS for frame on '{name}'"))?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_state,
            AtomEnum::ATOM,
            &[atoms.net_wm_state_above],
        )
        .context(format!("Failed to set always-on-top for frame on '{name}'"))?;

        // Pointer events fall through to whatever is underneath
        conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::INPUT,
            ClipOrdering::UNSORTED,
            window,
            0,
            0,
            &[],
        )
        .context(format!("Failed to clear input region for frame on '{name}'"))?;
        Ok(())
    }

    /// `physical_size_known` is false for monitors that report no size in
    /// millimetres; only those take their scale from `Xft.dpi`
    pub fn new(
        conn: Arc<RustConnection>,
        screen: ScreenInfo,
        atoms: &CachedAtoms,
        monitor: &Monitor,
        physical_size_known: bool,
        rgb: u32,
    ) -> Result<Self> {
        let window = Self::create_window(&conn, screen, monitor, rgb)?;

        // From here on Drop destroys the window if a later step fails
        let mut frame = Self {
            window,
            name: monitor.name.clone(),
            area: monitor.working_area,
            mapped: false,
            physical_size_known,
            rgb,
            gc: x11rb::NONE,
            root: screen.root,
            opacity_atom: atoms.net_wm_window_opacity,
            conn,
        };

        Self::setup_window_properties(&frame.conn, atoms, window, &frame.name)?;

        let gc = frame.conn.generate_id()
            .context("Failed to generate ID for frame graphics context")?;
        frame.conn.create_gc(gc, window, &CreateGCAux::new().foreground(rgb))
            .context(format!("Failed to create graphics context for frame on '{}'", frame.name))?;
        frame.gc = gc;

        frame.conn.flush()
            .context("Failed to flush X11 connection after frame creation")?;
        info!(window = frame.window, monitor = %frame.name, "Created frame window");
        Ok(frame)
    }

    fn set_mapped(&mut self, mapped: bool) -> Result<()> {
        if self.mapped == mapped {
            return Ok(());
        }
        if mapped {
            self.conn.map_window(self.window)
                .inspect_err(|e| error!(window = self.window, error = ?e, "Failed to map frame window"))
                .context(format!("Failed to map frame window on '{}'", self.name))?;
            self.conn.configure_window(
                self.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .context(format!("Failed to raise frame window on '{}'", self.name))?;
        } else {
            self.conn.unmap_window(self.window)
                .context(format!("Failed to unmap frame window on '{}'", self.name))?;
        }
        self.mapped = mapped;
        debug!(window = self.window, mapped, "Frame window visibility changed");
        Ok(())
    }

    fn apply_shape(&self, context: &MonitorContext) -> Result<()> {
        let scale = context.scale();
        let offset = context.offset();
        let style = context.style();
        let mut region = band_rectangles(
            self.area.height,
            scale,
            offset,
            |y| context.geometry().row_spans(y),
        );
        if let Some(ring) = context.visual.hover.map(|hover| hover_ring(hover, offset, style.hole_radius, scale)) {
            region.extend(band_rectangles(self.area.height, scale, offset, |y| ring(y)));
        }
        self.conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::BOUNDING,
            ClipOrdering::UNSORTED,
            self.window,
            0,
            0,
            &region,
        )
        .context(format!("Failed to set frame shape on '{}'", self.name))?;
        Ok(())
    }

    /// Fill each edge band with the frame colour at that edge's brightness
    fn paint(&self, context: &MonitorContext) -> Result<()> {
        let scale = context.scale();
        let offset = context.offset();
        let band_x = scale.to_physical_x(offset.x + context.style().thickness).round() as u16;
        let band_y = scale.to_physical_y(offset.y + context.style().thickness).round() as u16;
        let (width, height) = (extent(self.area.width), extent(self.area.height));
        let band_x = band_x.min(width);
        let band_y = band_y.min(height);

        let lighting = &context.visual.lighting;
        let bands = [
            (lighting.left_brightness, Rectangle { x: 0, y: 0, width: band_x, height }),
            (lighting.right_brightness, Rectangle { x: coord(i32::from(width - band_x)), y: 0, width: band_x, height }),
            (lighting.top_brightness, Rectangle { x: 0, y: 0, width, height: band_y }),
            (lighting.bottom_brightness, Rectangle { x: 0, y: coord(i32::from(height - band_y)), width, height: band_y }),
        ];
        for (brightness, band) in bands {
            self.conn.change_gc(self.gc, &ChangeGCAux::new().foreground(shade(self.rgb, brightness)))
                .context("Failed to set frame band colour")?;
            self.conn.poly_fill_rectangle(self.window, self.gc, &[band])
                .context(format!("Failed to paint frame band on '{}'", self.name))?;
        }

        if let Some(hover) = context.visual.hover {
            let ring = hover_ring(hover, offset, context.style().hole_radius, scale);
            let rects = band_rectangles(self.area.height, scale, offset, |y| ring(y));
            self.conn.change_gc(self.gc, &ChangeGCAux::new().foreground(self.rgb))
                .context("Failed to set hover ring colour")?;
            self.conn.poly_fill_rectangle(self.window, self.gc, &rects)
                .context(format!("Failed to paint hover ring on '{}'", self.name))?;
        }

        self.conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.opacity_atom,
            AtomEnum::CARDINAL,
            &[opacity(lighting.brightness)],
        )
        .context(format!("Failed to set frame opacity on '{}'", self.name))?;
        Ok(())
    }
}

impl Surface for FrameWindow {
    fn exclude_from_capture(&mut self) -> Result<()> {
        bail!("X11 has no per-window capture exclusion")
    }

    fn realized_scale(&self) -> Option<DpiScale> {
        // The physical-size estimate stands, skip the round trip
        if self.physical_size_known {
            return None;
        }
        let xft = xft_dpi(&self.conn, self.root)
            .inspect_err(|e| debug!(error = ?e, "Could not read Xft.dpi"))
            .ok()
            .flatten();
        screen_wide_scale(self.physical_size_known, xft)
    }

    fn place(&mut self, area: PhysicalRect) -> Result<()> {
        self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(area.x)
                .y(area.y)
                .width(area.width)
                .height(area.height),
        )
        .context(format!("Failed to move frame window on '{}'", self.name))?;
        self.area = area;
        Ok(())
    }

    fn present(&mut self, context: &MonitorContext) -> Result<()> {
        let visible = context.visual.light_on && context.visual.frame_visible;
        if visible {
            self.apply_shape(context)?;
            self.set_mapped(true)?;
            self.paint(context)?;
        } else {
            self.set_mapped(false)?;
        }
        self.conn.flush()
            .context("Failed to flush X11 connection after presenting frame")?;
        Ok(())
    }
}

impl Drop for FrameWindow {
    fn drop(&mut self) {
        if self.gc != x11rb::NONE
            && let Err(e) = self.conn.free_gc(self.gc)
        {
            error!("Failed to free GC {}: {}", self.gc, e);
        }

        if let Err(e) = self.conn.destroy_window(self.window) {
            error!("Failed to destroy frame window {} on '{}': {}", self.window, self.name, e);
        }

        if let Err(e) = self.conn.flush() {
            error!("Failed to flush X11 connection during cleanup: {}", e);
        }
    }
}

/// Rasterize logical row spans into physical window rectangles.
///
/// `spans_at` takes a frame-local logical `y` and returns frame-local `x`
/// spans; consecutive rows with identical spans merge into taller rectangles.
fn band_rectangles(
    height_px: u32,
    scale: DpiScale,
    offset: Point,
    spans_at: impl Fn(f64) -> Vec<(f64, f64)>,
) -> Vec<Rectangle> {
    let mut rects: Vec<Rectangle> = Vec::new();
    let mut previous: Vec<(i16, i16)> = Vec::new();
    let mut run_start = 0;

    for py in 0..height_px.min(i16::MAX as u32) {
        let y = (f64::from(py) + 0.5) / scale.y - offset.y;
        let row: Vec<(i16, i16)> = spans_at(y)
            .into_iter()
            .filter_map(|(start, end)| {
                let start = scale.to_physical_x(start + offset.x).round() as i16;
                let end = scale.to_physical_x(end + offset.x).round() as i16;
                (end > start).then_some((start, end))
            })
            .collect();

        if !row.is_empty() && row == previous {
            for rect in &mut rects[run_start..] {
                rect.height += 1;
            }
        } else {
            run_start = rects.len();
            rects.extend(row.iter().map(|&(start, end)| Rectangle {
                x: start,
                y: py as i16,
                width: (end - start) as u16,
                height: 1,
            }));
        }
        previous = row;
    }
    rects
}

/// Annulus spans just outside the punched hole, frame-local
fn hover_ring(
    hover: Point,
    offset: Point,
    hole_radius: f64,
    scale: DpiScale,
) -> impl Fn(f64) -> Vec<(f64, f64)> {
    let center = hover.offset_by(offset.x, offset.y);
    let inner = Circle::new(center, hole_radius);
    let outer = Circle::new(center, hole_radius + f64::from(x11::HOVER_RING_WIDTH) / scale.x);
    move |y| {
        let Some(span) = outer.row_span(y) else {
            return Vec::new();
        };
        match inner.row_span(y) {
            Some(cut) => subtract_span(vec![span], cut),
            None => vec![span],
        }
    }
}

/// `Xft.dpi` covers the whole screen, so it only stands in for a monitor
/// without its own physical size
fn screen_wide_scale(physical_size_known: bool, xft: Option<f64>) -> Option<DpiScale> {
    if physical_size_known {
        return None;
    }
    xft.map(|dpi| DpiScale::from_dpi(dpi, dpi))
}

/// Saturate to the 16-bit X11 coordinate range
fn coord(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

fn extent(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// `0x00RRGGBB` scaled by `brightness`
fn shade(rgb: u32, brightness: f64) -> u32 {
    let k = brightness.clamp(0.0, 1.0);
    let channel = |shift: u32| ((f64::from((rgb >> shift) & 0xFF) * k).round() as u32) << shift;
    channel(16) | channel(8) | channel(0)
}

fn opacity(brightness: f64) -> u32 {
    (brightness.clamp(0.0, 1.0) * f64::from(u32::MAX)).round() as u32
}
