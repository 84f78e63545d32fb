//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Frame layout constants (logical units)
pub mod frame {
    /// Margin kept between the window edge and the outer frame, on each side
    pub const MARGIN: f64 = 20.0;

    /// Default frame thickness
    pub const DEFAULT_THICKNESS: f64 = 80.0;

    /// Default outer corner radius
    pub const DEFAULT_OUTER_RADIUS: f64 = 100.0;

    /// Default inner corner radius
    pub const DEFAULT_INNER_RADIUS: f64 = 60.0;

    /// Default hover ring diameter (hole radius is half of this)
    pub const DEFAULT_HOVER_RING_DIAMETER: f64 = 140.0;
}

/// DPI and scale constants
pub mod dpi {
    /// Reference DPI that maps to a scale of 1.0
    pub const BASE_DPI: f64 = 96.0;

    /// Scale differences at or below this are treated as equal
    pub const SCALE_EPSILON: f64 = 0.01;

    /// Millimetres per inch, for physical-size DPI estimates
    pub const MM_PER_INCH: f64 = 25.4;

    /// Estimated scales are snapped to this step
    pub const SCALE_STEP: f64 = 0.25;
}

/// Face-to-lighting constants
pub mod lighting {
    /// Lowest brightness any edge may reach
    pub const DEFAULT_MIN_EDGE_BRIGHTNESS: f64 = 0.3;

    /// Consecutive missed samples before reverting to neutral
    pub const DEFAULT_FRAMES_TO_NEUTRAL: u32 = 30;

    /// Smoothing factors at or below this transition instantly
    pub const SMOOTHING_EPSILON: f64 = 0.001;

    /// Default time between face samples, in milliseconds
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
}

/// Daemon lifecycle constants
pub mod daemon {
    /// How long shutdown waits for an in-flight face sample before abandoning it
    pub const SHUTDOWN_GRACE_MS: u64 = 250;
}

/// X11 protocol constants
pub mod x11 {
    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// XInput2 pseudo-device that aggregates every master pointer
    pub const ALL_MASTER_DEVICES: u16 = 1;

    /// Minimum RandR version providing GetMonitors
    pub const RANDR_VERSION: (u32, u32) = (1, 5);

    /// Minimum XInput version delivering raw events to the root window
    pub const XINPUT_VERSION: (u16, u16) = (2, 2);

    /// Line width of the hover ring outline, in pixels
    pub const HOVER_RING_WIDTH: u32 = 2;

    /// Window class set on frame windows
    pub const WM_CLASS: &[u8] = b"edge-light\0edge-light\0";

    /// X resource carrying the toolkit DPI
    pub const XFT_DPI_RESOURCE: &str = "Xft.dpi:";
}

/// Configuration file constants
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "edge-light";

    /// Config file name
    pub const FILENAME: &str = "config.json";
}
