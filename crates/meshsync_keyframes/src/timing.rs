// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clip-local/global time mapping and frame grid arithmetic.
//!
//! Two clip families exist and they map time differently:
//! - Timeline key frame clips honour `clip_in` and `time_scale`
//!   ([`keyframe_local_to_global`]).
//! - Scene cache clips place local time directly after the clip start
//!   ([`scene_cache_local_to_global`]).
//!
//! [`TimeMapping`] selects one of them per clip data at the type level.

use crate::host::ClipGeometry;
use serde::{Deserialize, Serialize};

/// Clip family tag, stored in snapshots to prevent cross-family restores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipFamily {
    /// Timeline key frame controller clips
    KeyFrame,
    /// Scene cache playback clips
    SceneCache,
}

impl ClipFamily {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyFrame => "KeyFrame",
            Self::SceneCache => "SceneCache",
        }
    }
}

fn effective_time_scale(clip: &ClipGeometry) -> f64 {
    if clip.time_scale > 0.0 {
        clip.time_scale
    } else {
        1.0
    }
}

/// Key frame family: `start + (local - clip_in) / time_scale`
pub fn keyframe_local_to_global(local_time: f64, clip: &ClipGeometry) -> f64 {
    clip.start + (local_time - clip.clip_in) / effective_time_scale(clip)
}

/// Inverse of [`keyframe_local_to_global`]
pub fn keyframe_global_to_local(global_time: f64, clip: &ClipGeometry) -> f64 {
    (global_time - clip.start) * effective_time_scale(clip) + clip.clip_in
}

/// Scene cache family: `start + local`
pub fn scene_cache_local_to_global(local_time: f64, clip: &ClipGeometry) -> f64 {
    clip.start + local_time
}

/// Inverse of [`scene_cache_local_to_global`]
pub fn scene_cache_global_to_local(global_time: f64, clip: &ClipGeometry) -> f64 {
    global_time - clip.start
}

/// Per-family timing strategy
pub trait TimeMapping {
    /// Family tag
    const FAMILY: ClipFamily;

    /// Map a clip-local time to global timeline time
    fn local_to_global(local_time: f64, clip: &ClipGeometry) -> f64;

    /// Map a global timeline time back to clip-local time
    fn global_to_local(global_time: f64, clip: &ClipGeometry) -> f64;

    /// Local time span covered by the frame grid
    fn ideal_duration(clip: &ClipGeometry) -> f64;

    /// Number of grid slots the clip should have
    fn ideal_frame_count(clip: &ClipGeometry) -> usize {
        let frames = (Self::ideal_duration(clip) * clip.frame_rate).round();
        if frames.is_finite() && frames > 0.0 {
            frames as usize
        } else {
            0
        }
    }

    /// Spacing of a grid with `num_frames` slots
    fn time_per_frame(clip: &ClipGeometry, num_frames: usize) -> f64 {
        if num_frames == 0 {
            return 0.0;
        }
        Self::ideal_duration(clip) / num_frames as f64
    }
}

/// Timing of timeline key frame controller clips
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFrameTiming;

impl TimeMapping for KeyFrameTiming {
    const FAMILY: ClipFamily = ClipFamily::KeyFrame;

    fn local_to_global(local_time: f64, clip: &ClipGeometry) -> f64 {
        keyframe_local_to_global(local_time, clip)
    }

    fn global_to_local(global_time: f64, clip: &ClipGeometry) -> f64 {
        keyframe_global_to_local(global_time, clip)
    }

    fn ideal_duration(clip: &ClipGeometry) -> f64 {
        clip.duration + clip.clip_in
    }
}

/// Timing of scene cache clips
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneCacheTiming;

impl TimeMapping for SceneCacheTiming {
    const FAMILY: ClipFamily = ClipFamily::SceneCache;

    fn local_to_global(local_time: f64, clip: &ClipGeometry) -> f64 {
        scene_cache_local_to_global(local_time, clip)
    }

    fn global_to_local(global_time: f64, clip: &ClipGeometry) -> f64 {
        scene_cache_global_to_local(global_time, clip)
    }

    fn ideal_duration(clip: &ClipGeometry) -> f64 {
        clip.duration
    }
}

/// Snap a local time to the nearest slot of a grid with `num_frames` slots
/// spanning `ideal_duration`. Clamped to the grid; `None` for an empty grid.
pub fn frame_index_for_local_time(local_time: f64, num_frames: usize, ideal_duration: f64) -> Option<usize> {
    if num_frames == 0 {
        return None;
    }
    if ideal_duration <= 0.0 || !local_time.is_finite() {
        return Some(0);
    }

    let last = (num_frames - 1) as f64;
    let index = (local_time * num_frames as f64 / ideal_duration).round();
    Some(index.clamp(0.0, last) as usize)
}

/// Float equality with a relative tolerance, used to detect clip edits
pub fn approximately(a: f64, b: f64) -> bool {
    let tolerance = (1e-6 * a.abs().max(b.abs())).max(f64::EPSILON * 8.0);
    (b - a).abs() < tolerance
}
