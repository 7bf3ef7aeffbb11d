//! Staging paths across directory visits for one batched transfer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::app::command::{CommandLine, Transfer};
use crate::app::target::absolute_form;
use crate::domain::model::PathList;

/// Paths waiting for a batched transfer, in the order they were marked.
///
/// Paths are stored in their absolute, lexically normalised form so the same file marked from
/// different directories is only staged once.
#[derive(Debug, Default, Clone)]
pub struct StagingQueue {
    paths: PathList,
}

impl StagingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Access the staged paths.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&absolute_form(path))
    }

    /// Stage `path` unless it is already staged. Returns `true` when the queue grew.
    pub fn mark(&mut self, path: impl AsRef<Path>) -> bool {
        let canonical = absolute_form(path.as_ref());
        if self.paths.contains(&canonical) {
            return false;
        }
        self.paths.push(canonical);
        true
    }

    /// Remove `path` from the queue. Returns `true` when it was staged.
    pub fn unmark(&mut self, path: impl AsRef<Path>) -> bool {
        let canonical = absolute_form(path.as_ref());
        let original_len = self.paths.len();
        self.paths.retain(|staged| *staged != canonical);
        self.paths.len() != original_len
    }

    /// Remove every staged path.
    pub fn reset(&mut self) {
        self.paths.clear();
    }

    /// Take every staged path and leave the queue empty. `None` when nothing is staged.
    pub fn take(&mut self) -> Option<PathList> {
        if self.paths.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.paths))
    }

    /// Build the batched transfer of every staged path to `destination`, then clear the queue.
    ///
    /// Returns `None` without building anything when the queue is empty.
    pub fn flush(&mut self, transfer: &Transfer<'_>, destination: &str) -> Option<CommandLine> {
        let paths = self.take()?;
        let command = transfer.command(&paths, destination);
        tracing::debug!(count = paths.len(), destination, "flushed staging queue");
        Some(command)
    }
}

/// A [`StagingQueue`] shared between sessions.
///
/// Every operation holds the lock for its whole duration, so a flush observes a complete snapshot
/// and clears it before any other session can mark or unmark.
#[derive(Debug, Default, Clone)]
pub struct SharedStagingQueue {
    inner: Arc<Mutex<StagingQueue>>,
}

impl SharedStagingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the staged paths.
    pub fn snapshot(&self) -> PathList {
        self.inner.lock().paths().to_vec()
    }

    pub fn mark(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().mark(path)
    }

    pub fn unmark(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().unmark(path)
    }

    /// Clear the queue. Returns how many paths were staged.
    pub fn reset(&self) -> usize {
        let mut queue = self.inner.lock();
        let cleared = queue.len();
        queue.reset();
        cleared
    }

    pub fn flush(&self, transfer: &Transfer<'_>, destination: &str) -> Option<CommandLine> {
        self.inner.lock().flush(transfer, destination)
    }
}
