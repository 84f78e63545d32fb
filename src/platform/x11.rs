//! X11 backend: RandR monitors, shaped frame windows and an XInput2 pointer hook

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::protocol::shape::ConnectionExt as ShapeExt;
use x11rb::protocol::xinput::{self, ConnectionExt as XinputExt};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::{
    HookHandle, Monitor, MonitorId, PhysicalRect, Platform, PlatformEvent, PointerSink,
    ScreenPoint,
};
use crate::constants::x11;
use crate::frame_window::{FrameWindow, ScreenInfo};
use crate::x11_utils::{atom_name, physical_dpi, send_wake, workarea, CachedAtoms};

pub struct X11Platform {
    conn: Arc<RustConnection>,
    screen: ScreenInfo,
    atoms: CachedAtoms,
    frame_rgb: u32,
}

impl X11Platform {
    pub fn connect(frame_rgb: u32) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
        let root = &conn.setup().roots[screen_num];
        let screen = ScreenInfo {
            root: root.root,
            depth: root.root_depth,
            visual: root.root_visual,
        };
        info!(screen = screen_num, root = screen.root, "Connected to X11 server");

        let (major, minor) = x11::RANDR_VERSION;
        let randr = conn.randr_query_version(major, minor)
            .context("Failed to query RandR version")?
            .reply()
            .context("RandR extension not available")?;
        if (randr.major_version, randr.minor_version) < x11::RANDR_VERSION {
            return Err(anyhow!(
                "RandR {}.{} found, {major}.{minor} required",
                randr.major_version,
                randr.minor_version
            ));
        }
        conn.shape_query_version()
            .context("Failed to query SHAPE version")?
            .reply()
            .context("SHAPE extension not available")?;

        let atoms = CachedAtoms::new(&conn)
            .context("Failed to cache X11 atoms at startup")?;

        Ok(Self {
            conn: Arc::new(conn),
            screen,
            atoms,
            frame_rgb,
        })
    }

    fn monitor_infos(&self) -> Result<Vec<randr::MonitorInfo>> {
        Ok(self.conn
            .randr_get_monitors(self.screen.root, true)
            .context("Failed to query RandR monitors")?
            .reply()
            .context("Failed to get reply for RandR monitor query")?
            .monitors)
    }
}

impl Platform for X11Platform {
    type Surface = FrameWindow;

    #[tracing::instrument(skip(self))]
    fn monitors(&self) -> Result<Vec<Monitor>> {
        let workarea = workarea(&self.conn, self.screen.root, &self.atoms)
            .inspect_err(|e| debug!(error = ?e, "No usable _NET_WORKAREA"))
            .ok()
            .flatten();

        self.monitor_infos()?
            .into_iter()
            .map(|info| {
                let bounds = PhysicalRect::new(
                    info.x.into(),
                    info.y.into(),
                    info.width.into(),
                    info.height.into(),
                );
                let working_area = workarea
                    .and_then(|area| bounds.intersect(&area))
                    .unwrap_or(bounds);
                let name = atom_name(&self.conn, info.name)
                    .unwrap_or_else(|_| format!("monitor-{}", info.name));
                Ok(Monitor {
                    id: MonitorId(info.name),
                    name,
                    bounds,
                    working_area,
                    primary: info.primary,
                })
            })
            .collect()
    }

    fn monitor_dpi(&self, monitor: MonitorId) -> Result<(f64, f64)> {
        let info = self.monitor_infos()?
            .into_iter()
            .find(|info| info.name == monitor.0)
            .ok_or_else(|| anyhow!("Monitor {monitor} is no longer connected"))?;
        let dpi_x = physical_dpi(info.width, info.width_in_millimeters);
        let dpi_y = physical_dpi(info.height, info.height_in_millimeters);
        match (dpi_x, dpi_y) {
            (Some(x), Some(y)) => Ok((x, y)),
            // Square pixels when only one axis has a usable size
            (Some(d), None) | (None, Some(d)) => Ok((d, d)),
            (None, None) => Err(anyhow!("Monitor {monitor} reports no physical size")),
        }
    }

    fn create_surface(&self, monitor: &Monitor) -> Result<FrameWindow> {
        let physical_size_known = self.monitor_dpi(monitor.id).is_ok();
        FrameWindow::new(
            Arc::clone(&self.conn),
            self.screen,
            &self.atoms,
            monitor,
            physical_size_known,
            self.frame_rgb,
        )
    }

    #[tracing::instrument(skip(self, sink))]
    fn install_pointer_hook(&self, sink: PointerSink) -> Result<Box<dyn HookHandle>> {
        Ok(Box::new(X11PointerHook::install(sink)?))
    }

    fn forward_events(&self, events: mpsc::UnboundedSender<PlatformEvent>) -> Result<()> {
        let root = self.screen.root;
        self.conn.randr_select_input(
            root,
            randr::NotifyMask::SCREEN_CHANGE
                | randr::NotifyMask::CRTC_CHANGE
                | randr::NotifyMask::OUTPUT_CHANGE,
        )
        .context("Failed to select RandR notifications")?;
        self.conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )
        .context("Failed to watch root window properties")?;
        self.conn.flush()
            .context("Failed to flush X11 connection after event selection")?;

        let conn = Arc::clone(&self.conn);
        let atoms = self.atoms;
        thread::Builder::new()
            .name("x11-events".to_string())
            .spawn(move || {
                loop {
                    let event = match conn.wait_for_event() {
                        Ok(event) => event,
                        Err(e) => {
                            error!(error = ?e, "X11 connection lost, stopping event pump");
                            break;
                        }
                    };
                    if let Some(translated) = translate_event(&event, root, &atoms)
                        && events.send(translated).is_err()
                    {
                        debug!("Event receiver dropped, stopping event pump");
                        break;
                    }
                }
            })
            .context("Failed to spawn X11 event thread")?;
        Ok(())
    }
}

fn translate_event(event: &Event, root: Window, atoms: &CachedAtoms) -> Option<PlatformEvent> {
    match event {
        Event::RandrScreenChangeNotify(_) | Event::RandrNotify(_) => {
            Some(PlatformEvent::TopologyChanged)
        }
        Event::PropertyNotify(e) if e.window == root => {
            if e.atom == u32::from(AtomEnum::RESOURCE_MANAGER) {
                Some(PlatformEvent::DpiChanged(None))
            } else if e.atom == atoms.net_workarea {
                Some(PlatformEvent::TopologyChanged)
            } else {
                None
            }
        }
        Event::Expose(e) if e.count == 0 => Some(PlatformEvent::Redraw),
        Event::Error(e) => {
            warn!(error = ?e, "X11 error");
            None
        }
        _ => None,
    }
}

/// XInput2 raw-motion listener on its own connection and thread
struct X11PointerHook {
    conn: Arc<RustConnection>,
    wake_window: Window,
    wake_atom: Atom,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl X11PointerHook {
    fn install(sink: PointerSink) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to open X11 connection for pointer hook")?;
        let root = conn.setup().roots[screen_num].root;

        let (major, minor) = x11::XINPUT_VERSION;
        let version = conn.xinput_xi_query_version(major, minor)
            .context("Failed to query XInput version")?
            .reply()
            .context("XInput extension not available")?;
        if (version.major_version, version.minor_version) < x11::XINPUT_VERSION {
            return Err(anyhow!(
                "XInput {}.{} found, {major}.{minor} required",
                version.major_version,
                version.minor_version
            ));
        }

        let wake_atom = CachedAtoms::new(&conn)?.wake;
        let wake_window = conn.generate_id()
            .context("Failed to generate ID for pointer hook wake window")?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            wake_window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .context("Failed to create pointer hook wake window")?;

        conn.xinput_xi_select_events(
            root,
            &[xinput::EventMask {
                deviceid: x11::ALL_MASTER_DEVICES,
                mask: vec![xinput::XIEventMask::RAW_MOTION.into()],
            }],
        )
        .context("Failed to select XInput raw motion events")?;
        conn.flush()
            .context("Failed to flush pointer hook connection")?;

        let conn = Arc::new(conn);
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let conn = Arc::clone(&conn);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("pointer-hook".to_string())
                .spawn(move || run_hook(&conn, root, &stop, &sink))
                .context("Failed to spawn pointer hook thread")?
        };

        Ok(Self {
            conn,
            wake_window,
            wake_atom,
            stop,
            thread: Some(thread),
        })
    }
}

fn run_hook(conn: &RustConnection, root: Window, stop: &AtomicBool, sink: &PointerSink) {
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => {
                error!(error = ?e, "Pointer hook connection lost");
                return;
            }
        };
        if stop.load(Ordering::Acquire) {
            return;
        }

        // Collapse a burst of motion into one position query
        let mut moved = matches!(event, Event::XinputRawMotion(_));
        while let Ok(Some(next)) = conn.poll_for_event() {
            moved |= matches!(next, Event::XinputRawMotion(_));
        }
        if !moved {
            continue;
        }

        match conn.query_pointer(root).map(|cookie| cookie.reply()) {
            Ok(Ok(pointer)) => {
                sink.deliver(ScreenPoint::new(pointer.root_x.into(), pointer.root_y.into()));
            }
            Ok(Err(e)) => debug!(error = ?e, "Pointer query failed"),
            Err(e) => {
                error!(error = ?e, "Pointer hook connection lost");
                return;
            }
        }
    }
}

impl HookHandle for X11PointerHook {
    fn uninstall(mut self: Box<Self>) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = send_wake(&self.conn, self.wake_window, self.wake_atom) {
            warn!(error = ?e, "Failed to wake pointer hook thread");
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Pointer hook thread panicked");
        }
        if let Err(e) = self.conn.destroy_window(self.wake_window) {
            debug!(error = ?e, "Failed to destroy wake window");
        }
        if let Err(e) = self.conn.flush() {
            debug!(error = ?e, "Failed to flush X11 connection after removing pointer hook");
        }
    }
}
