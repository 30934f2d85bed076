// SPDX-License-Identifier: MIT OR Apache-2.0
//! Marker display-density policy.

use crate::settings::FrameSyncSettings;

/// Frames narrower than this many pixels hide their markers
pub const FRAME_MARKER_WIDTH_THRESHOLD: f64 = 10.0;

/// Decides whether frame markers should exist at all.
///
/// `visible = requested && (force_show || width_per_frame > threshold)`
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerVisibility {
    requested: bool,
    force_show: bool,
    width_per_frame: f64,
    threshold: f64,
    visible: bool,
}

impl MarkerVisibility {
    /// Create a policy from settings
    pub fn new(settings: &FrameSyncSettings) -> Self {
        let mut visibility = Self {
            requested: settings.markers_requested_by_default,
            force_show: false,
            width_per_frame: settings.initial_width_per_frame,
            threshold: settings.marker_width_threshold,
            visible: false,
        };
        visibility.update();
        visibility
    }

    /// User intent to show markers
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Whether markers are currently shown
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether markers are shown regardless of density
    pub fn is_forced(&self) -> bool {
        self.force_show
    }

    /// Last reported width of one frame in pixels
    pub fn width_per_frame(&self) -> f64 {
        self.width_per_frame
    }

    /// Set the request. Force-show only sticks while markers are requested.
    pub(crate) fn set_requested(&mut self, requested: bool, force_show: bool) {
        self.requested = requested;
        self.force_show = force_show && requested;
    }

    pub(crate) fn set_width_per_frame(&mut self, width_per_frame: f64) {
        self.width_per_frame = width_per_frame;
    }

    /// Re-evaluate visibility. Returns true if it flipped.
    pub(crate) fn update(&mut self) -> bool {
        let previous = self.visible;
        self.visible = self.requested && (self.force_show || self.width_per_frame > self.threshold);
        previous != self.visible
    }
}

impl Default for MarkerVisibility {
    fn default() -> Self {
        Self::new(&FrameSyncSettings::default())
    }
}

/// Width of one frame given the visible part of the timeline
pub fn width_per_frame(visible_rect_width: f64, visible_time: f64, fps: f64, time_scale: f64) -> f64 {
    let scale = if time_scale > 0.0 { time_scale } else { 1.0 };
    let num_frames = (visible_time * fps / scale).round();
    if num_frames <= 0.0 || !num_frames.is_finite() {
        return f64::INFINITY;
    }
    visible_rect_width / num_frames
}
