//! Deterministic page selection.
//!
//! Pages are chosen by task ordinal, newest first: with `n` the list's next
//! ordinal, page `p` of size `s` covers ids `[n - (p+1)s, n - ps)`, clamped
//! at zero. The selected tasks are then shown by creation time, newest first,
//! so the display order is by timestamp even though selection is by id.

use crate::types::{Task, TaskId};

/// Half-open id range `[start, end)` selected for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: TaskId,
    pub end: TaskId,
}

impl PageWindow {
    /// Window for page `page` of `page_size` tasks in a list whose next
    /// ordinal is `next_id`.
    pub fn new(next_id: TaskId, page: usize, page_size: usize) -> Self {
        let size = page_size as u64;
        let page = page as u64;
        let end = next_id.saturating_sub(page.saturating_mul(size));
        let start = next_id.saturating_sub(page.saturating_add(1).saturating_mul(size));
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.start <= id && id < self.end
    }

    /// Whether older tasks exist below this window.
    pub fn has_older(&self) -> bool {
        self.start > 0
    }
}

/// Stable sort by creation time, newest first.
pub fn sort_by_recency(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
