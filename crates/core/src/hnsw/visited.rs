//! Per-traversal "seen" marks over dense node ids.
//!
//! Every traversal opens a new epoch with [`VisitedSet::begin`]; a node counts as seen
//! when its mark equals the current epoch, so starting over never touches the marks.

#[derive(Debug, Default)]
pub struct VisitedSet {
    marks: Vec<u32>,
    epoch: u32,
}

impl VisitedSet {
    pub fn with_len(len: usize) -> Self {
        Self {
            marks: vec![0; len],
            epoch: 0,
        }
    }

    /// Opens a fresh epoch covering ids `< len`, growing the marks if needed.
    /// Must be called before the first [`Self::mark`].
    pub fn begin(&mut self, len: usize) {
        if self.marks.len() < len {
            self.marks.resize(len, 0);
        }
        self.epoch = match self.epoch.checked_add(1) {
            Some(next) => next,
            None => {
                self.marks.fill(0);
                1
            }
        };
    }

    /// Marks `id` as seen; `true` on its first visit in this epoch.
    #[inline]
    pub fn mark(&mut self, id: u32) -> bool {
        let mark = &mut self.marks[id as usize];
        let first = *mark != self.epoch;
        *mark = self.epoch;
        first
    }
}
