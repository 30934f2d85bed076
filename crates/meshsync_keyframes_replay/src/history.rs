// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot-based undo/redo for replayed edits.
//!
//! Each recorded edit stores the clip data snapshot before and after the
//! step, bincode encoded.

use meshsync_keyframes::ClipDataSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Maximum undo history depth
const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Encoded clip data state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized clip data
    pub data: Vec<u8>,
}

impl StateSnapshot {
    /// Encode a clip data snapshot
    pub fn capture(snapshot: &ClipDataSnapshot) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(snapshot)?,
        })
    }

    /// Decode back into a clip data snapshot
    pub fn restore(&self) -> Result<ClipDataSnapshot> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An edit that can be undone/redone
#[derive(Debug, Clone)]
pub struct Operation {
    /// Human-readable description
    pub description: String,
    /// Clip the edit applies to
    pub clip: String,
    /// State before the edit (for undo)
    pub before: StateSnapshot,
    /// State after the edit (for redo)
    pub after: StateSnapshot,
}

impl Operation {
    /// Get memory size of this operation
    pub fn memory_size(&self) -> usize {
        self.before.size() + self.after.size()
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Operations in undo stack
    pub undo_count: usize,
    /// Operations in redo stack
    pub redo_count: usize,
    /// Total memory used by history (bytes)
    pub memory_used: usize,
    /// Description of the next undo
    pub next_undo: Option<String>,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Operation>,
    redo_stack: VecDeque<Operation>,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            memory_used: 0,
        }
    }

    /// Record an edit. Edits that changed nothing are dropped.
    pub fn commit(&mut self, operation: Operation) {
        if operation.before == operation.after {
            return;
        }

        self.redo_stack.clear();

        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }
    }

    /// Undo the last edit
    pub fn undo(&mut self) -> Result<Operation> {
        let operation = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;

        self.memory_used = self.memory_used.saturating_sub(operation.memory_size());
        self.redo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Redo the last undone edit
    pub fn redo(&mut self) -> Result<Operation> {
        let operation = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;

        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            next_undo: self.undo_description().map(str::to_string),
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|op| op.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsync_keyframes::{ClipFamily, CLIP_DATA_FORMAT_VERSION};

    fn state(markers_requested: bool) -> StateSnapshot {
        StateSnapshot::capture(&ClipDataSnapshot {
            version: CLIP_DATA_FORMAT_VERSION,
            family: ClipFamily::SceneCache,
            frames: Vec::new(),
            markers_requested,
        })
        .unwrap()
    }

    fn operation(description: &str) -> Operation {
        Operation {
            description: description.to_string(),
            clip: "shot".to_string(),
            before: state(true),
            after: state(false),
        }
    }

    #[test]
    fn test_undo_redo() {
        let mut history = History::new();
        assert!(matches!(history.undo(), Err(HistoryError::NothingToUndo)));

        history.commit(operation("Hide"));
        assert_eq!(history.undo_description(), Some("Hide"));

        let undone = history.undo().unwrap();
        assert!(undone.before.restore().unwrap().markers_requested);
        assert_eq!(history.stats().redo_count, 1);

        let redone = history.redo().unwrap();
        assert!(!redone.after.restore().unwrap().markers_requested);
        assert!(matches!(history.redo(), Err(HistoryError::NothingToRedo)));
    }

    #[test]
    fn test_unchanged_edit_not_recorded() {
        let mut history = History::new();
        history.commit(Operation {
            description: "Nothing".to_string(),
            clip: "shot".to_string(),
            before: state(true),
            after: state(true),
        });
        assert_eq!(history.stats().undo_count, 0);
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = History::new();
        history.commit(operation("A"));
        history.undo().unwrap();
        history.commit(operation("B"));
        assert_eq!(history.stats().redo_count, 0);
    }

    #[test]
    fn test_max_depth() {
        let mut history = History::with_max_depth(2);
        for name in ["A", "B", "C"] {
            history.commit(operation(name));
        }
        let stats = history.stats();
        assert_eq!(stats.undo_count, 2);
        assert_eq!(stats.memory_used, 2 * operation("A").memory_size());
        assert_eq!(stats.next_undo.as_deref(), Some("C"));
    }
}
