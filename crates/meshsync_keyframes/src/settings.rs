// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tunables for frame marker synchronization.

use crate::visibility::FRAME_MARKER_WIDTH_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings loading errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A value is out of range
    #[error("Invalid setting {name}: {reason}")]
    Invalid {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Frame marker synchronization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSyncSettings {
    /// Minimum width of one frame (pixels) for markers to be created
    pub marker_width_threshold: f64,
    /// Whether new clip data starts with markers requested
    pub markers_requested_by_default: bool,
    /// Width per frame assumed until the host reports one
    pub initial_width_per_frame: f64,
}

impl Default for FrameSyncSettings {
    fn default() -> Self {
        Self {
            marker_width_threshold: FRAME_MARKER_WIDTH_THRESHOLD,
            markers_requested_by_default: true,
            initial_width_per_frame: f64::from(i16::MAX),
        }
    }
}

impl FrameSyncSettings {
    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, SettingsError> {
        let settings: Self = ron::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Load settings from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.marker_width_threshold.is_finite() || self.marker_width_threshold < 0.0 {
            return Err(SettingsError::Invalid {
                name: "marker_width_threshold",
                reason: format!("expected a non-negative number, got {}", self.marker_width_threshold),
            });
        }
        if self.initial_width_per_frame.is_nan() {
            return Err(SettingsError::Invalid {
                name: "initial_width_per_frame",
                reason: "must be a number".to_string(),
            });
        }
        Ok(())
    }
}
