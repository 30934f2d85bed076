// SPDX-License-Identifier: MIT OR Apache-2.0
//! Replay scripts: a clip family plus a list of host events.
//!
//! Scripts are RON files. Tracks and clips are referred to by name.
//!
//! ```ron
//! (
//!     family: SceneCache,
//!     frame_rate: 10.0,
//!     steps: [
//!         AddTrack("Cache"),
//!         AddClip(name: "shot", track: "Cache", start: 0.0, duration: 1.0),
//!         ClipChanged("shot"),
//!         DragKeyFrame(clip: "shot", frame: 2, time: 0.62),
//!         ClipChanged("shot"),
//!     ],
//! )
//! ```

use meshsync_keyframes::{ClipFamily, FrameSyncSettings, KeyFrameMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    /// Clip family every clip in the script belongs to
    pub family: ClipFamily,
    /// Settings override
    #[serde(default)]
    pub settings: Option<FrameSyncSettings>,
    /// Timeline frame rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Events to replay, in order
    pub steps: Vec<ReplayStep>,
}

fn default_frame_rate() -> f64 {
    60.0
}

fn default_time_scale() -> f64 {
    1.0
}

/// One host event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayStep {
    /// Create a track
    AddTrack(String),
    /// Create a clip on a track, with its clip data
    AddClip {
        /// Clip name
        name: String,
        /// Track name
        track: String,
        /// Start time
        start: f64,
        /// Duration
        duration: f64,
        /// Source offset at the clip start
        #[serde(default)]
        clip_in: f64,
        /// Playback speed
        #[serde(default = "default_time_scale")]
        time_scale: f64,
    },
    /// Edit a clip's geometry. Missing fields keep their value.
    SetClip {
        /// Clip name
        clip: String,
        /// New start
        #[serde(default)]
        start: Option<f64>,
        /// New duration
        #[serde(default)]
        duration: Option<f64>,
        /// New clip-in
        #[serde(default)]
        clip_in: Option<f64>,
        /// New time scale
        #[serde(default)]
        time_scale: Option<f64>,
    },
    /// Put a clip on another track
    MoveClipToTrack {
        /// Clip name
        clip: String,
        /// Track name
        track: String,
    },
    /// Take a clip off its track
    DetachClip(String),
    /// Drag the marker of a frame to a global time
    DragKeyFrame {
        /// Clip name
        clip: String,
        /// Frame index owning the marker
        frame: usize,
        /// Global time to drop the marker at
        time: f64,
    },
    /// Delete the marker of a frame from the host side
    DeleteKeyFrameMarker {
        /// Clip name
        clip: String,
        /// Frame index owning the marker
        frame: usize,
    },
    /// Deliver a clip changed event
    ClipChanged(String),
    /// Deliver a graph start event
    GraphStart(String),
    /// Add a key frame at a global time
    AddKeyFrame {
        /// Clip name
        clip: String,
        /// Global time
        time: f64,
    },
    /// Regenerate key frames over the whole clip
    Regenerate {
        /// Clip name
        clip: String,
        /// Frames between keys
        span: usize,
        /// Mode of the regenerated frames
        mode: KeyFrameMode,
    },
    /// Regenerate key frames in `[start, end)`
    RegenerateRange {
        /// Clip name
        clip: String,
        /// First frame
        start: usize,
        /// End frame, exclusive
        end: usize,
        /// Frames between keys
        span: usize,
        /// Mode of the regenerated frames
        mode: KeyFrameMode,
    },
    /// Make every frame a key playing its own index
    InitFrames(String),
    /// Rebuild the frame array from scratch
    ResetFrames(String),
    /// Show or hide markers
    RequestMarkers {
        /// Clip name
        clip: String,
        /// Show markers
        show: bool,
        /// Ignore the density heuristic
        #[serde(default)]
        force: bool,
    },
    /// Report the drawn width of one frame in pixels
    WidthPerFrame {
        /// Clip name
        clip: String,
        /// Pixels per frame
        width: f64,
    },
    /// Toggle a frame between continuous and hold
    ToggleMode {
        /// Clip name
        clip: String,
        /// Frame index
        frame: usize,
    },
    /// Undo the last recorded edit
    Undo,
    /// Redo the last undone edit
    Redo,
    /// Save a clip's frames to a RON file
    Save {
        /// Clip name
        clip: String,
        /// Output path
        path: PathBuf,
    },
}

impl ReplayStep {
    /// Short label used for logs and undo entries
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddTrack(_) => "Add Track",
            Self::AddClip { .. } => "Add Clip",
            Self::SetClip { .. } => "Edit Clip",
            Self::MoveClipToTrack { .. } => "Move Clip To Track",
            Self::DetachClip(_) => "Detach Clip",
            Self::DragKeyFrame { .. } => "Drag Key Frame",
            Self::DeleteKeyFrameMarker { .. } => "Delete Key Frame Marker",
            Self::ClipChanged(_) => "Clip Changed",
            Self::GraphStart(_) => "Graph Start",
            Self::AddKeyFrame { .. } => "Add Key Frame",
            Self::Regenerate { .. } => "Regenerate Key Frames",
            Self::RegenerateRange { .. } => "Regenerate Key Frames In Range",
            Self::InitFrames(_) => "Init Playable Frames",
            Self::ResetFrames(_) => "Reset Playable Frames",
            Self::RequestMarkers { .. } => "Show/Hide Frame Markers",
            Self::WidthPerFrame { .. } => "Width Per Frame",
            Self::ToggleMode { .. } => "Toggle Key Frame Mode",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::Save { .. } => "Save",
        }
    }

    /// Clip whose clip data the step may change
    pub fn edited_clip(&self) -> Option<&str> {
        match self {
            Self::SetClip { clip, .. }
            | Self::MoveClipToTrack { clip, .. }
            | Self::DragKeyFrame { clip, .. }
            | Self::DeleteKeyFrameMarker { clip, .. }
            | Self::AddKeyFrame { clip, .. }
            | Self::Regenerate { clip, .. }
            | Self::RegenerateRange { clip, .. }
            | Self::RequestMarkers { clip, .. }
            | Self::WidthPerFrame { clip, .. }
            | Self::ToggleMode { clip, .. }
            | Self::DetachClip(clip)
            | Self::ClipChanged(clip)
            | Self::GraphStart(clip)
            | Self::InitFrames(clip)
            | Self::ResetFrames(clip) => Some(clip),
            Self::AddTrack(_) | Self::AddClip { .. } | Self::Undo | Self::Redo | Self::Save { .. } => None,
        }
    }
}

impl ReplayScript {
    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load a script file
    pub fn load(path: impl AsRef<Path>) -> crate::session::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_ron(&contents)?)
    }

    /// Settings to run the script with
    pub fn settings(&self) -> FrameSyncSettings {
        self.settings.clone().unwrap_or_default()
    }
}
