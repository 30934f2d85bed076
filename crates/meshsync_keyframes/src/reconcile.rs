// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapping dragged key frames back onto the fixed frame grid.

use crate::keyframe::{KeyFrameInfo, PlayableFrame};
use crate::timing::frame_index_for_local_time;
use indexmap::{IndexMap, IndexSet};

/// Moves decided by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovePlan {
    /// Destination slot -> payload landing there. Later sources overwrite
    /// earlier ones.
    pub moved: IndexMap<usize, KeyFrameInfo>,
    /// Vacated slots that did not also receive a payload
    pub disable: IndexSet<usize>,
}

impl MovePlan {
    /// Whether anything moves
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }

    /// Plan moves for frames whose `local_time` holds the dragged position.
    ///
    /// A frame whose snapped slot equals its own index stays put.
    pub fn from_frames(frames: &[PlayableFrame], ideal_duration: f64) -> Self {
        let num_frames = frames.len();
        let mut plan = MovePlan::default();

        for (i, frame) in frames.iter().enumerate() {
            let Some(dest) = frame_index_for_local_time(frame.local_time(), num_frames, ideal_duration) else {
                continue;
            };
            if dest == i {
                continue;
            }

            plan.moved.insert(dest, frame.key_frame_info());
            plan.disable.insert(i);
        }

        for dest in plan.moved.keys() {
            plan.disable.shift_remove(dest);
        }
        plan
    }

    /// Write the payloads and disable vacated slots
    pub fn apply(&self, frames: &mut [PlayableFrame]) {
        for (&dest, &info) in &self.moved {
            if let Some(frame) = frames.get_mut(dest) {
                frame.apply_key_frame_info(info);
            }
        }
        for &i in &self.disable {
            if let Some(frame) = frames.get_mut(i) {
                frame.set_enabled(false);
            }
        }
    }
}
