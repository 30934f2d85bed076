// SPDX-License-Identifier: MIT OR Apache-2.0
//! Replay session: an in-memory timeline, its clips and their clip data.

use crate::history::{History, HistoryError, Operation, StateSnapshot};
use crate::report::{ClipReport, FrameReport, NotificationRecord, ReplayReport};
use crate::script::{ReplayScript, ReplayStep};
use indexmap::IndexMap;
use meshsync_keyframes::{
    ClipDataError, ClipGeometry, ClipId, FrameSyncSettings, InMemoryTimeline, PlayableFrame, PlayableFrameClipData,
    TimeMapping, TimelineHost, TrackId,
};
use thiserror::Error;

/// Replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Script parse error
    #[error("Failed to parse script: {0}")]
    Script(#[from] ron::error::SpannedError),

    /// Clip data persistence error
    #[error(transparent)]
    ClipData(#[from] ClipDataError),

    /// Undo/redo error
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Report encoding error
    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown track name
    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    /// Unknown clip name
    #[error("Unknown clip: {0}")]
    UnknownClip(String),

    /// Name already taken
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// A step failed
    #[error("Step {index} ({label}) failed: {source}")]
    Step {
        /// Step index
        index: usize,
        /// Step label
        label: &'static str,
        /// Underlying error
        #[source]
        source: Box<ReplayError>,
    },
}

/// Result type for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// A clip on the replay timeline
#[derive(Debug)]
pub struct ReplayClip<M: TimeMapping> {
    /// Host clip handle
    pub id: ClipId,
    /// Key frame data of the clip
    pub data: PlayableFrameClipData<M>,
}

/// Replays host events against clip data of one family
#[derive(Debug)]
pub struct Session<M: TimeMapping> {
    timeline: InMemoryTimeline,
    settings: FrameSyncSettings,
    frame_rate: f64,
    tracks: IndexMap<String, TrackId>,
    clips: IndexMap<String, ReplayClip<M>>,
    history: History,
    notifications: Vec<NotificationRecord>,
    steps_run: usize,
}

fn clip_mut<'a, M: TimeMapping>(
    clips: &'a mut IndexMap<String, ReplayClip<M>>,
    name: &str,
) -> Result<&'a mut ReplayClip<M>> {
    clips.get_mut(name).ok_or_else(|| ReplayError::UnknownClip(name.to_string()))
}

fn track_id(tracks: &IndexMap<String, TrackId>, name: &str) -> Result<TrackId> {
    tracks
        .get(name)
        .copied()
        .ok_or_else(|| ReplayError::UnknownTrack(name.to_string()))
}

impl<M: TimeMapping> Session<M> {
    /// Create an empty session
    pub fn new(settings: FrameSyncSettings, frame_rate: f64) -> Self {
        Self {
            timeline: InMemoryTimeline::new(),
            settings,
            frame_rate,
            tracks: IndexMap::new(),
            clips: IndexMap::new(),
            history: History::new(),
            notifications: Vec::new(),
            steps_run: 0,
        }
    }

    /// Create a session configured by a script
    pub fn for_script(script: &ReplayScript) -> Self {
        Self::new(script.settings(), script.frame_rate)
    }

    /// Run every step of a script
    pub fn run(&mut self, steps: &[ReplayStep]) -> Result<()> {
        for step in steps {
            let index = self.steps_run;
            self.apply(step).map_err(|e| ReplayError::Step {
                index,
                label: step.label(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Run one step, recording it for undo if it changed clip data
    pub fn apply(&mut self, step: &ReplayStep) -> Result<()> {
        let index = self.steps_run;
        self.steps_run += 1;
        tracing::info!("[{}] {}", index, step.label());

        let before = match step.edited_clip() {
            Some(name) => Some(self.capture(name)?),
            None => None,
        };

        self.execute(step)?;

        if let (Some(name), Some(before)) = (step.edited_clip(), before) {
            let after = self.capture(name)?;
            self.history.commit(Operation {
                description: step.label().to_string(),
                clip: name.to_string(),
                before,
                after,
            });
        }

        self.drain_notifications(index);
        Ok(())
    }

    fn execute(&mut self, step: &ReplayStep) -> Result<()> {
        match step {
            ReplayStep::AddTrack(name) => {
                if self.tracks.contains_key(name) {
                    return Err(ReplayError::DuplicateName(name.clone()));
                }
                let id = self.timeline.add_track(name.clone());
                self.tracks.insert(name.clone(), id);
            }
            ReplayStep::AddClip {
                name,
                track,
                start,
                duration,
                clip_in,
                time_scale,
            } => {
                if self.clips.contains_key(name) {
                    return Err(ReplayError::DuplicateName(name.clone()));
                }
                let track = track_id(&self.tracks, track)?;
                let geometry = ClipGeometry::new(*start, *duration, self.frame_rate)
                    .with_clip_in(*clip_in)
                    .with_time_scale(*time_scale);
                let id = self.timeline.add_clip(track, geometry);
                let data = PlayableFrameClipData::with_settings(id, &self.settings);
                self.clips.insert(name.clone(), ReplayClip { id, data });
            }
            ReplayStep::SetClip {
                clip,
                start,
                duration,
                clip_in,
                time_scale,
            } => {
                let id = clip_mut(&mut self.clips, clip)?.id;
                let mut geometry = self
                    .timeline
                    .clip_geometry(id)
                    .ok_or_else(|| ReplayError::UnknownClip(clip.clone()))?;
                geometry.start = start.unwrap_or(geometry.start);
                geometry.duration = duration.unwrap_or(geometry.duration);
                geometry.clip_in = clip_in.unwrap_or(geometry.clip_in);
                geometry.time_scale = time_scale.unwrap_or(geometry.time_scale);
                self.timeline.set_clip_geometry(id, geometry);
            }
            ReplayStep::MoveClipToTrack { clip, track } => {
                let track = track_id(&self.tracks, track)?;
                let id = clip_mut(&mut self.clips, clip)?.id;
                self.timeline.move_clip_to_track(id, track);
            }
            ReplayStep::DetachClip(clip) => {
                let id = clip_mut(&mut self.clips, clip)?.id;
                self.timeline.detach_clip(id);
            }
            ReplayStep::DragKeyFrame { clip, frame, time } => {
                let entry = clip_mut(&mut self.clips, clip)?;
                match entry.data.playable_frame(*frame).and_then(PlayableFrame::marker_id) {
                    Some(marker) => {
                        self.timeline.drag_marker(marker, *time);
                    }
                    None => tracing::warn!("Frame {} of {} has no marker to drag", frame, clip),
                }
            }
            ReplayStep::DeleteKeyFrameMarker { clip, frame } => {
                let entry = clip_mut(&mut self.clips, clip)?;
                match entry.data.playable_frame(*frame).and_then(PlayableFrame::marker_id) {
                    Some(marker) => {
                        self.timeline.remove_marker(marker);
                    }
                    None => tracing::warn!("Frame {} of {} has no marker to delete", frame, clip),
                }
            }
            ReplayStep::ClipChanged(clip) => {
                clip_mut(&mut self.clips, clip)?.data.on_clip_changed(&mut self.timeline);
            }
            ReplayStep::GraphStart(clip) => {
                clip_mut(&mut self.clips, clip)?.data.on_graph_start(&mut self.timeline);
            }
            ReplayStep::AddKeyFrame { clip, time } => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .add_key_frame(&mut self.timeline, *time);
            }
            ReplayStep::Regenerate { clip, span, mode } => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .regenerate_key_frames(&mut self.timeline, *span, *mode);
            }
            ReplayStep::RegenerateRange {
                clip,
                start,
                end,
                span,
                mode,
            } => {
                clip_mut(&mut self.clips, clip)?.data.regenerate_key_frames_in_range(
                    &mut self.timeline,
                    *start,
                    *end,
                    *span,
                    *mode,
                );
            }
            ReplayStep::InitFrames(clip) => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .init_playable_frames(&mut self.timeline);
            }
            ReplayStep::ResetFrames(clip) => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .reset_playable_frames(&mut self.timeline);
            }
            ReplayStep::RequestMarkers { clip, show, force } => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .request_frame_markers(&mut self.timeline, *show, *force);
            }
            ReplayStep::WidthPerFrame { clip, width } => {
                clip_mut(&mut self.clips, clip)?
                    .data
                    .set_timeline_width_per_frame(&mut self.timeline, *width);
            }
            ReplayStep::ToggleMode { clip, frame } => {
                if !clip_mut(&mut self.clips, clip)?.data.toggle_key_frame_mode(*frame) {
                    tracing::warn!("Frame {} of {} does not exist", frame, clip);
                }
            }
            ReplayStep::Undo => {
                let operation = self.history.undo()?;
                tracing::debug!("Undo {} on {}", operation.description, operation.clip);
                self.restore(&operation.clip, &operation.before)?;
            }
            ReplayStep::Redo => {
                let operation = self.history.redo()?;
                tracing::debug!("Redo {} on {}", operation.description, operation.clip);
                self.restore(&operation.clip, &operation.after)?;
            }
            ReplayStep::Save { clip, path } => {
                clip_mut(&mut self.clips, clip)?.data.snapshot().save(path)?;
                tracing::info!("Saved {} to {}", clip, path.display());
            }
        }
        Ok(())
    }

    fn capture(&mut self, name: &str) -> Result<StateSnapshot> {
        let clip = clip_mut(&mut self.clips, name)?;
        Ok(StateSnapshot::capture(&clip.data.snapshot())?)
    }

    /// Put a clip's data back to a recorded state and rebuild its markers
    fn restore(&mut self, name: &str, state: &StateSnapshot) -> Result<()> {
        let snapshot = state.restore()?;
        clip_mut(&mut self.clips, name)?
            .data
            .restore_snapshot(&mut self.timeline, snapshot)?;
        Ok(())
    }

    fn drain_notifications(&mut self, step: usize) {
        for (name, clip) in &mut self.clips {
            for notification in clip.data.take_notifications() {
                tracing::debug!("{} -> {:?}", name, notification);
                self.notifications.push(NotificationRecord {
                    step,
                    clip: name.clone(),
                    notification,
                });
            }
        }
    }

    /// Summarize the final state
    pub fn report(&self) -> ReplayReport {
        let clips = self
            .clips
            .iter()
            .map(|(name, clip)| {
                let track = self.timeline.parent_track(clip.id);
                ClipReport {
                    name: name.clone(),
                    track: track.and_then(|id| self.track_name(id)),
                    markers_requested: clip.data.are_frame_markers_requested(),
                    markers_visible: clip.data.are_frame_markers_visible(),
                    needs_timeline_refresh: clip.data.needs_timeline_refresh(),
                    marker_count: track.map_or(0, |id| self.timeline.marker_count(id)),
                    frames: clip.data.playable_frames().iter().map(FrameReport::from).collect(),
                }
            })
            .collect();

        ReplayReport {
            family: M::FAMILY,
            steps: self.steps_run,
            clips,
            notifications: self.notifications.clone(),
            history: self.history.stats(),
        }
    }

    fn track_name(&self, id: TrackId) -> Option<String> {
        self.tracks
            .iter()
            .find(|(_, track)| **track == id)
            .map(|(name, _)| name.clone())
    }
}

/// Run a whole script and report the final state
pub fn replay<M: TimeMapping>(script: &ReplayScript) -> Result<ReplayReport> {
    let mut session = Session::<M>::for_script(script);
    session.run(&script.steps)?;
    Ok(session.report())
}
