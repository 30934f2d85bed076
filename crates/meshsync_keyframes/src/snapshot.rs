// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistent form of clip data.
//!
//! Only the frame array and the user's marker request are stored. Markers
//! are session-local, so a restored clip data has none until the host calls
//! [`PlayableFrameClipData::refresh_all_markers`] or
//! [`PlayableFrameClipData::on_clip_changed`].

use crate::clip_data::PlayableFrameClipData;
use crate::host::TimelineHost;
use crate::keyframe::PlayableFrame;
use crate::marker::ClipId;
use crate::settings::FrameSyncSettings;
use crate::timing::{ClipFamily, TimeMapping};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current snapshot format version
pub const CLIP_DATA_FORMAT_VERSION: u32 = 1;

/// Clip data persistence errors
#[derive(Debug, Error)]
pub enum ClipDataError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Ron(#[from] ron::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// Written by a newer version
    #[error("Unsupported clip data version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Snapshot of another clip family
    #[error("Clip data family mismatch: expected {}, found {}", .expected.name(), .found.name())]
    FamilyMismatch {
        /// Family of the clip data being restored
        expected: ClipFamily,
        /// Family stored in the snapshot
        found: ClipFamily,
    },
}

/// Result type for clip data persistence
pub type Result<T> = std::result::Result<T, ClipDataError>;

/// Serializable clip data
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipDataSnapshot {
    /// Format version
    pub version: u32,
    /// Clip family the frames belong to
    pub family: ClipFamily,
    /// Playable frames in index order
    pub frames: Vec<PlayableFrame>,
    /// Whether the user asked for frame markers
    #[serde(default = "default_markers_requested")]
    pub markers_requested: bool,
}

fn default_markers_requested() -> bool {
    true
}

impl ClipDataSnapshot {
    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self> {
        let mut snapshot: Self = ron::from_str(s)?;
        if snapshot.version > CLIP_DATA_FORMAT_VERSION {
            return Err(ClipDataError::UnsupportedVersion {
                found: snapshot.version,
                supported: CLIP_DATA_FORMAT_VERSION,
            });
        }
        snapshot.reindex();
        Ok(snapshot)
    }

    /// Frame indices are not stored; rebuild them from array position
    fn reindex(&mut self) {
        for (i, frame) in self.frames.iter_mut().enumerate() {
            let local_time = frame.local_time();
            frame.set_index_and_local_time(i, local_time);
        }
    }

    /// Save to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_ron()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }
}

impl<M: TimeMapping> PlayableFrameClipData<M> {
    /// Capture the persistent state
    pub fn snapshot(&self) -> ClipDataSnapshot {
        ClipDataSnapshot {
            version: CLIP_DATA_FORMAT_VERSION,
            family: M::FAMILY,
            frames: self.frames.iter().map(PlayableFrame::duplicate).collect(),
            markers_requested: self.visibility.is_requested(),
        }
    }

    /// Restore clip data for `clip` from a snapshot
    pub fn from_snapshot(clip: ClipId, snapshot: ClipDataSnapshot) -> Result<Self> {
        Self::from_snapshot_with_settings(clip, snapshot, &FrameSyncSettings::default())
    }

    /// Restore clip data with custom settings
    pub fn from_snapshot_with_settings(
        clip: ClipId,
        snapshot: ClipDataSnapshot,
        settings: &FrameSyncSettings,
    ) -> Result<Self> {
        if snapshot.family != M::FAMILY {
            return Err(ClipDataError::FamilyMismatch {
                expected: M::FAMILY,
                found: snapshot.family,
            });
        }

        let mut snapshot = snapshot;
        snapshot.reindex();

        let mut data = Self::with_settings(clip, settings);
        data.frames = snapshot.frames;
        data.visibility.set_requested(snapshot.markers_requested, false);
        data.visibility.update();

        tracing::debug!(
            "Restored {} playable frames for {:?} ({})",
            data.frames.len(),
            clip,
            M::FAMILY.name()
        );
        Ok(data)
    }

    /// Replace the frames in place with a recorded state, then rebuild the
    /// markers against the current clip.
    ///
    /// The current markers are released first. Zoom and force-show are kept,
    /// only the marker request comes from the snapshot.
    pub fn restore_snapshot(&mut self, host: &mut dyn TimelineHost, snapshot: ClipDataSnapshot) -> Result<()> {
        if snapshot.family != M::FAMILY {
            return Err(ClipDataError::FamilyMismatch {
                expected: M::FAMILY,
                found: snapshot.family,
            });
        }

        self.destroy(host);

        let mut snapshot = snapshot;
        snapshot.reindex();
        self.frames = snapshot.frames;
        self.last_refresh = None;

        let force_show = self.visibility.is_forced();
        self.visibility.set_requested(snapshot.markers_requested, force_show);
        self.visibility.update();

        self.on_clip_changed(host);
        Ok(())
    }
}
