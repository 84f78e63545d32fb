//! Configuration for the edge-light daemon
//!
//! Settings are read once at startup from a JSON file in the user config
//! directory. The daemon never writes the file; a missing or broken file
//! falls back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::constants::{config, frame, lighting};
use crate::geometry::FrameStyle;
use crate::lighting::LightingConfig;

const DEFAULT_FRAME_COLOR: &str = "#FFF4E0";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frame_thickness: f64,
    pub outer_corner_radius: f64,
    pub inner_corner_radius: f64,
    pub hover_ring_diameter: f64,
    pub min_edge_brightness: f64,
    pub frames_to_neutral: u32,
    /// 0.0 switches instantly; closer to 1.0 eases more slowly
    pub smoothing_factor: f64,
    pub face_sample_interval_ms: u64,
    pub positional_influence: f64,
    pub show_on_all_monitors: bool,
    pub light_on: bool,
    /// `#RRGGBB`, `#` optional
    pub frame_color: String,
    /// JSON-lines face sample stream; face tracking is off when unset
    pub face_samples: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_thickness: frame::DEFAULT_THICKNESS,
            outer_corner_radius: frame::DEFAULT_OUTER_RADIUS,
            inner_corner_radius: frame::DEFAULT_INNER_RADIUS,
            hover_ring_diameter: frame::DEFAULT_HOVER_RING_DIAMETER,
            min_edge_brightness: lighting::DEFAULT_MIN_EDGE_BRIGHTNESS,
            frames_to_neutral: lighting::DEFAULT_FRAMES_TO_NEUTRAL,
            smoothing_factor: 0.0,
            face_sample_interval_ms: lighting::DEFAULT_SAMPLE_INTERVAL_MS,
            positional_influence: 1.0,
            show_on_all_monitors: false,
            light_on: true,
            frame_color: DEFAULT_FRAME_COLOR.to_string(),
            face_samples: None,
        }
    }
}

/// Parse `#RRGGBB` / `RRGGBB` into `0x00RRGGBB`
pub fn parse_hex_rgb(hex: &str) -> Option<u32> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILENAME);
        path
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(contents).context("Failed to parse settings JSON")?;
        Ok(settings.sanitized())
    }

    /// Load from `path` (or the default location). Never fails.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(settings) => {
                    info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    error!(path = %path.display(), error = ?e, "Invalid settings file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                info!(path = %path.display(), reason = %e, "No settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Replace out-of-range values with defaults or clamp them
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();

        if !(self.frame_thickness.is_finite() && self.frame_thickness > 0.0) {
            warn!(value = self.frame_thickness, "frame_thickness must be positive, using default");
            self.frame_thickness = defaults.frame_thickness;
        }
        for (name, value, default) in [
            ("outer_corner_radius", &mut self.outer_corner_radius, defaults.outer_corner_radius),
            ("inner_corner_radius", &mut self.inner_corner_radius, defaults.inner_corner_radius),
            ("hover_ring_diameter", &mut self.hover_ring_diameter, defaults.hover_ring_diameter),
            ("positional_influence", &mut self.positional_influence, defaults.positional_influence),
        ] {
            if !(value.is_finite() && *value >= 0.0) {
                warn!(field = name, value = *value, "Value must be non-negative, using default");
                *value = default;
            }
        }
        if !(0.0..=1.0).contains(&self.min_edge_brightness) {
            warn!(value = self.min_edge_brightness, "min_edge_brightness outside 0..=1, clamping");
            self.min_edge_brightness = if self.min_edge_brightness.is_nan() {
                defaults.min_edge_brightness
            } else {
                self.min_edge_brightness.clamp(0.0, 1.0)
            };
        }
        if !(0.0..1.0).contains(&self.smoothing_factor) {
            warn!(value = self.smoothing_factor, "smoothing_factor outside 0..1, disabling smoothing");
            self.smoothing_factor = 0.0;
        }
        if self.frames_to_neutral == 0 {
            warn!("frames_to_neutral must be at least 1");
            self.frames_to_neutral = 1;
        }
        if self.face_sample_interval_ms == 0 {
            warn!("face_sample_interval_ms must be non-zero, using default");
            self.face_sample_interval_ms = defaults.face_sample_interval_ms;
        }
        if parse_hex_rgb(&self.frame_color).is_none() {
            error!(frame_color = %self.frame_color, "Invalid frame_color hex, using default");
            self.frame_color = defaults.frame_color;
        }
        self
    }

    pub fn frame_style(&self) -> FrameStyle {
        FrameStyle {
            thickness: self.frame_thickness,
            outer_radius: self.outer_corner_radius,
            inner_radius: self.inner_corner_radius,
            hole_radius: self.hover_ring_diameter / 2.0,
        }
    }

    pub fn lighting_config(&self) -> LightingConfig {
        LightingConfig {
            min_edge_brightness: self.min_edge_brightness,
            frames_to_neutral: self.frames_to_neutral,
            smoothing_factor: self.smoothing_factor,
            positional_influence: self.positional_influence,
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.face_sample_interval_ms)
    }

    pub fn frame_rgb(&self) -> u32 {
        parse_hex_rgb(&self.frame_color)
            .or_else(|| parse_hex_rgb(DEFAULT_FRAME_COLOR))
            .unwrap_or(0x00FF_FFFF)
    }
}
