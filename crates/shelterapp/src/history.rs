//! Bounded undo/redo stacks of roster snapshots.
//!
//! The two stacks are disjoint. Recording a new mutation clears redo. When a
//! stack reaches its limit the oldest snapshot is dropped.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct History<T> {
    undo: VecDeque<T>,
    redo: VecDeque<T>,
    limit: usize,
}

impl<T> History<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Save `snapshot` as the state before a new mutation.
    pub fn record(&mut self, snapshot: T) {
        push_bounded(&mut self.undo, snapshot, self.limit);
        self.redo.clear();
    }

    /// Step back. `current` goes onto redo; the returned snapshot replaces it.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        push_bounded(&mut self.redo, current, self.limit);
        Some(previous)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo.pop_back()?;
        push_bounded(&mut self.undo, current, self.limit);
        Some(next)
    }

    /// Forget redo without recording a snapshot, for mutations that are not
    /// themselves undoable.
    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

fn push_bounded<T>(stack: &mut VecDeque<T>, item: T, limit: usize) {
    if stack.len() == limit {
        stack.pop_front();
    }
    stack.push_back(item);
}
