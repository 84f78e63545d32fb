use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::constants::{dpi, x11};
use crate::platform::PhysicalRect;

/// Pre-cached X11 atoms to avoid repeated roundtrips
#[derive(Debug, Clone, Copy)]
pub struct CachedAtoms {
    pub net_workarea: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_window_opacity: Atom,
    pub wake: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {name} atom"))?
        .reply()
        .context(format!("Failed to get reply for {name} atom"))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_workarea: intern(conn, "_NET_WORKAREA")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, "_NET_WM_STATE_ABOVE")?,
            net_wm_window_opacity: intern(conn, "_NET_WM_WINDOW_OPACITY")?,
            wake: intern(conn, "_EDGE_LIGHT_WAKE")?,
        })
    }
}

pub fn atom_name(conn: &RustConnection, atom: Atom) -> Result<String> {
    let reply = conn
        .get_atom_name(atom)
        .context(format!("Failed to query name of atom {atom}"))?
        .reply()
        .context(format!("Failed to get name reply for atom {atom}"))?;
    Ok(String::from_utf8_lossy(&reply.name).into_owned())
}

/// Desktop work area from `_NET_WORKAREA` (first desktop), if the WM sets it
pub fn workarea(conn: &RustConnection, root: Window, atoms: &CachedAtoms) -> Result<Option<PhysicalRect>> {
    let reply = conn
        .get_property(false, root, atoms.net_workarea, AtomEnum::CARDINAL, 0, 4)
        .context("Failed to query _NET_WORKAREA property")?
        .reply()
        .context("Failed to get reply for _NET_WORKAREA query")?;
    let values: Vec<u32> = reply.value32().map(Iterator::collect).unwrap_or_default();
    Ok(match values.as_slice() {
        [x, y, width, height, ..] => Some(PhysicalRect::new(*x as i32, *y as i32, *width, *height)),
        _ => None,
    })
}

/// `Xft.dpi` from the root window's RESOURCE_MANAGER, if set
pub fn xft_dpi(conn: &RustConnection, root: Window) -> Result<Option<f64>> {
    let reply = conn
        .get_property(false, root, AtomEnum::RESOURCE_MANAGER, AtomEnum::STRING, 0, u32::MAX)
        .context("Failed to query RESOURCE_MANAGER property")?
        .reply()
        .context("Failed to get reply for RESOURCE_MANAGER query")?;
    Ok(parse_xft_dpi(&String::from_utf8_lossy(&reply.value)))
}

pub fn parse_xft_dpi(resources: &str) -> Option<f64> {
    resources
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(x11::XFT_DPI_RESOURCE))
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|dpi| *dpi > 0.0)
}

/// DPI implied by a monitor's physical size, snapped to the nearest scale step
pub fn physical_dpi(pixels: u16, millimetres: u32) -> Option<f64> {
    if millimetres == 0 || pixels == 0 {
        return None;
    }
    let raw = f64::from(pixels) * dpi::MM_PER_INCH / f64::from(millimetres);
    let scale = (raw / dpi::BASE_DPI / dpi::SCALE_STEP).round() * dpi::SCALE_STEP;
    (scale > 0.0).then_some(scale * dpi::BASE_DPI)
}

/// Send a client message to one of our own windows, waking a blocked event reader
pub fn send_wake(conn: &RustConnection, window: Window, atom: Atom) -> Result<()> {
    let event = ClientMessageEvent::new(32, window, atom, [0u32; 5]);
    conn.send_event(false, window, EventMask::NO_EVENT, event)
        .context(format!("Failed to send wake message to window {window}"))?;
    conn.flush()
        .context("Failed to flush X11 connection after wake message")?;
    Ok(())
}
