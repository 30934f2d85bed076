// SPDX-License-Identifier: MIT OR Apache-2.0
//! Final replay report, printed as text or JSON.

use crate::history::HistoryStats;
use meshsync_keyframes::{ClipFamily, HostNotification, KeyFrameMode, PlayableFrame};
use serde::Serialize;
use std::fmt;

/// A host notification raised by a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    /// Step that raised it
    pub step: usize,
    /// Clip name
    pub clip: String,
    /// The notification
    pub notification: HostNotification,
}

/// Final state of one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// Frame index
    pub index: usize,
    /// Clip-local time
    pub local_time: f64,
    /// Source frame played
    pub play_frame: i32,
    /// Whether the frame is a key
    pub enabled: bool,
    /// Interpolation mode
    pub mode: KeyFrameMode,
    /// Whether a marker mirrors the frame
    pub has_marker: bool,
    /// User annotation
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_note: String,
}

impl From<&PlayableFrame> for FrameReport {
    fn from(frame: &PlayableFrame) -> Self {
        Self {
            index: frame.index(),
            local_time: frame.local_time(),
            play_frame: frame.play_frame(),
            enabled: frame.is_enabled(),
            mode: frame.mode(),
            has_marker: frame.has_marker(),
            user_note: frame.user_note().to_string(),
        }
    }
}

/// Final state of one clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipReport {
    /// Clip name
    pub name: String,
    /// Track the clip sits on
    pub track: Option<String>,
    /// Whether the user asked for markers
    pub markers_requested: bool,
    /// Whether markers are shown
    pub markers_visible: bool,
    /// Whether a timeline refresh is still pending
    pub needs_timeline_refresh: bool,
    /// Markers on the clip's track
    pub marker_count: usize,
    /// Frames in index order
    pub frames: Vec<FrameReport>,
}

/// Everything a replay produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Clip family replayed
    pub family: ClipFamily,
    /// Steps run
    pub steps: usize,
    /// Clips in creation order
    pub clips: Vec<ClipReport>,
    /// Notifications drained after each step
    pub notifications: Vec<NotificationRecord>,
    /// Undo/redo state at the end
    pub history: HistoryStats,
}

impl ReplayReport {
    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} replay, {} steps", self.family.name(), self.steps)?;

        for clip in &self.clips {
            writeln!(
                f,
                "\nclip {} on {}: {} frames, {} markers{}{}",
                clip.name,
                clip.track.as_deref().unwrap_or("<no track>"),
                clip.frames.len(),
                clip.marker_count,
                if clip.markers_visible { "" } else { " (hidden)" },
                if clip.needs_timeline_refresh { ", refresh pending" } else { "" },
            )?;

            for frame in clip.frames.iter().filter(|frame| frame.enabled) {
                write!(
                    f,
                    "  [{:>4}] t={:.4} play={:<5} {:<10}",
                    frame.index,
                    frame.local_time,
                    frame.play_frame,
                    frame.mode.name()
                )?;
                if !frame.user_note.is_empty() {
                    write!(f, " \"{}\"", frame.user_note)?;
                }
                writeln!(f)?;
            }
        }

        writeln!(f, "\nnotifications: {}", self.notifications.len())?;
        for record in &self.notifications {
            writeln!(f, "  step {:>3} {}: {:?}", record.step, record.clip, record.notification)?;
        }

        write!(
            f,
            "history: {} undo, {} redo, {} bytes",
            self.history.undo_count, self.history.redo_count, self.history.memory_used
        )?;
        match &self.history.next_undo {
            Some(description) => write!(f, ", next undo: {description}"),
            None => Ok(()),
        }
    }
}
