// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key frame and frame marker synchronization for MeshSync timeline clips.
//!
//! A clip holds a fixed grid of playable frames, one per timeline frame.
//! Enabled frames are key frames that decide which source frame plays, and
//! each one is mirrored by a draggable marker on the clip's track.
//!
//! ## Architecture
//!
//! - [`PlayableFrameClipData`] owns the frame array and reconciles it with
//!   the markers whenever the clip changes
//! - [`TimeMapping`] selects how local time maps to the timeline per clip family
//! - [`TimelineHost`] is everything the core needs from the host timeline
//! - [`MarkerVisibility`] hides markers when frames are drawn too narrow
//! - [`ClipDataSnapshot`] is the persistent form of a clip's frames

pub mod clip_data;
pub mod host;
pub mod keyframe;
pub mod marker;
pub mod reconcile;
pub mod settings;
pub mod snapshot;
pub mod timeline;
pub mod timing;
pub mod visibility;

pub use clip_data::{KeyFrameControllerClipData, PlayableFrameClipData, SceneCacheClipData};
pub use host::{ClipGeometry, HostNotification, TimelineHost};
pub use keyframe::{KeyFrameInfo, KeyFrameMode, PlayableFrame};
pub use marker::{ClipId, FrameMarker, MarkerId, TrackId};
pub use reconcile::MovePlan;
pub use settings::{FrameSyncSettings, SettingsError};
pub use snapshot::{ClipDataError, ClipDataSnapshot, CLIP_DATA_FORMAT_VERSION};
pub use timeline::InMemoryTimeline;
pub use timing::{ClipFamily, KeyFrameTiming, SceneCacheTiming, TimeMapping};
pub use visibility::{MarkerVisibility, FRAME_MARKER_WIDTH_THRESHOLD};
