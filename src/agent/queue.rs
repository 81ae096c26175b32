use std::collections::HashSet;
use std::path::PathBuf;

use parking_lot::Mutex;

/// Pending file paths awaiting inspection. Duplicates collapse; order is
/// irrelevant because the agent processes by project grouping.
///
/// `drain` swaps the whole set out atomically, so files marked dirty while
/// a cycle is processing land in the next cycle's snapshot: never lost,
/// never double-processed within one cycle.
#[derive(Debug, Default)]
pub struct DirtySet {
    pending: Mutex<HashSet<PathBuf>>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the path was not already pending.
    pub fn mark(&self, path: impl Into<PathBuf>) -> bool {
        self.pending.lock().insert(path.into())
    }

    pub fn mark_all<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut pending = self.pending.lock();
        pending.extend(paths.into_iter().map(Into::into));
    }

    pub fn drain(&self) -> HashSet<PathBuf> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
