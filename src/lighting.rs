//! Face-to-lighting mapper
//!
//! Turns normalized face positions into per-edge brightness targets, debounces
//! face loss and eases the current parameters toward the target. Every update
//! is published to subscribers through a latest-wins `watch` channel.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::constants::lighting::{
    DEFAULT_FRAMES_TO_NEUTRAL, DEFAULT_MIN_EDGE_BRIGHTNESS, SMOOTHING_EPSILON,
};
use crate::face::FaceSample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingParameters {
    pub left_brightness: f64,
    pub top_brightness: f64,
    pub right_brightness: f64,
    pub bottom_brightness: f64,
    pub brightness: f64,
    pub is_tracking: bool,
    pub face_detected: bool,
}

impl Default for LightingParameters {
    /// Neutral: every edge at full brightness, no tracking
    fn default() -> Self {
        Self {
            left_brightness: 1.0,
            top_brightness: 1.0,
            right_brightness: 1.0,
            bottom_brightness: 1.0,
            brightness: 1.0,
            is_tracking: false,
            face_detected: false,
        }
    }
}

impl LightingParameters {
    /// Neutral brightness while tracking is on but no face is visible
    pub fn neutral_tracking() -> Self {
        Self {
            is_tracking: true,
            ..Self::default()
        }
    }

    /// Move every brightness field toward `target` by `t`; flags come from `target`
    pub fn interpolate(&self, target: &LightingParameters, t: f64) -> Self {
        let lerp = |from: f64, to: f64| from + (to - from) * t;
        Self {
            left_brightness: lerp(self.left_brightness, target.left_brightness),
            top_brightness: lerp(self.top_brightness, target.top_brightness),
            right_brightness: lerp(self.right_brightness, target.right_brightness),
            bottom_brightness: lerp(self.bottom_brightness, target.bottom_brightness),
            brightness: lerp(self.brightness, target.brightness),
            is_tracking: target.is_tracking,
            face_detected: target.face_detected,
        }
    }

    pub fn edges(&self) -> [f64; 4] {
        [
            self.left_brightness,
            self.top_brightness,
            self.right_brightness,
            self.bottom_brightness,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingConfig {
    pub min_edge_brightness: f64,
    pub frames_to_neutral: u32,
    pub smoothing_factor: f64,
    pub positional_influence: f64,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            min_edge_brightness: DEFAULT_MIN_EDGE_BRIGHTNESS,
            frames_to_neutral: DEFAULT_FRAMES_TO_NEUTRAL,
            smoothing_factor: 0.0,
            positional_influence: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceTrackingState {
    /// No face seen since start or reset
    NoFace,
    Tracking,
    /// Consecutive misses so far, below the neutral threshold
    LostRecently(u32),
    Neutral,
}

/// Brightness targets for a face centred at `(nx, ny)` in mirrored camera space
pub fn target_for_position(nx: f64, ny: f64, config: &LightingConfig) -> LightingParameters {
    let min_edge = config.min_edge_brightness;
    let screen_x = 1.0 - nx.clamp(0.0, 1.0);
    let screen_y = ny.clamp(0.0, 1.0);

    let x_offset = screen_x - 0.5;
    let y_offset = screen_y - 0.5;

    let boost = |v: f64| (v * 2.0 * config.positional_influence).clamp(0.0, 1.0);
    let left_boost = boost(-x_offset);
    let right_boost = boost(x_offset);
    let top_boost = boost(-y_offset);
    let bottom_boost = boost(y_offset);

    let edge = |own: f64, opposite: f64| {
        (min_edge + own + (1.0 - min_edge) * (1.0 - opposite)).clamp(min_edge, 1.0)
    };

    LightingParameters {
        left_brightness: edge(left_boost, right_boost),
        top_brightness: edge(top_boost, bottom_boost),
        right_brightness: edge(right_boost, left_boost),
        bottom_brightness: edge(bottom_boost, top_boost),
        brightness: 1.0,
        is_tracking: true,
        face_detected: true,
    }
}

pub struct FaceLightingMapper {
    config: LightingConfig,
    current: LightingParameters,
    target: LightingParameters,
    missed_frames: u32,
    state: FaceTrackingState,
    sender: watch::Sender<LightingParameters>,
}

impl FaceLightingMapper {
    pub fn new(config: LightingConfig) -> Self {
        let (sender, _) = watch::channel(LightingParameters::default());
        Self {
            config,
            current: LightingParameters::default(),
            target: LightingParameters::default(),
            missed_frames: 0,
            state: FaceTrackingState::NoFace,
            sender,
        }
    }

    /// Receive the current parameters after every update
    pub fn subscribe(&self) -> watch::Receiver<LightingParameters> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> LightingParameters {
        self.current
    }

    pub fn target(&self) -> LightingParameters {
        self.target
    }

    pub fn state(&self) -> FaceTrackingState {
        self.state
    }

    pub fn update(&mut self, sample: &FaceSample) -> LightingParameters {
        if sample.detected {
            self.missed_frames = 0;
            self.target = target_for_position(sample.x, sample.y, &self.config);
            self.state = FaceTrackingState::Tracking;
        } else {
            self.missed_frames = self.missed_frames.saturating_add(1);
            if self.missed_frames >= self.config.frames_to_neutral {
                if self.state != FaceTrackingState::Neutral {
                    info!(missed = self.missed_frames, "Face lost, returning to neutral lighting");
                }
                self.target = LightingParameters::neutral_tracking();
                self.state = FaceTrackingState::Neutral;
            } else if self.state != FaceTrackingState::NoFace {
                self.state = FaceTrackingState::LostRecently(self.missed_frames);
            }
        }

        self.current = self.transition();
        debug!(
            detected = sample.detected,
            processing_ms = sample.processing_time_ms,
            state = ?self.state,
            current = ?self.current,
            "Applied face sample"
        );
        self.sender.send_replace(self.current);
        self.current
    }

    fn transition(&self) -> LightingParameters {
        let smoothing = self.config.smoothing_factor;
        if smoothing <= SMOOTHING_EPSILON {
            self.target
        } else {
            self.current.interpolate(&self.target, 1.0 - smoothing)
        }
    }

    pub fn reset(&mut self) {
        self.current = LightingParameters::default();
        self.target = LightingParameters::default();
        self.missed_frames = 0;
        self.state = FaceTrackingState::NoFace;
        self.sender.send_replace(self.current);
    }

    /// Tracking turned off
    pub fn stop(&mut self) {
        info!("Face tracking stopped, lighting reset");
        self.reset();
    }
}
