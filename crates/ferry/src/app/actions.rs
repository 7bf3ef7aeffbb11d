//! User actions: gather paths from the host, build commands, and hand them off.

use std::path::PathBuf;

use crate::app::command::{self, Arg, CommandLine, Privilege};
use crate::app::staging::SharedStagingQueue;
use crate::domain::model::{PathList, Tools};

/// Read-only view of the host file browser's selection.
pub trait SelectionSource {
    /// Paths currently selected, in selection order.
    fn selected_paths(&self) -> PathList;

    /// Path under the cursor, if any.
    fn path_at_cursor(&self) -> Option<PathBuf>;
}

/// A plain list of paths: all of them selected, the first one under the cursor.
impl SelectionSource for PathList {
    fn selected_paths(&self) -> PathList {
        self.clone()
    }

    fn path_at_cursor(&self) -> Option<PathBuf> {
        self.first().cloned()
    }
}

/// Runs finished commands asynchronously. Submission is fire-and-forget.
pub trait ExecutionDelegate {
    fn submit(&self, command: CommandLine, label: &str);
}

/// What an action did, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A command was handed to the execution delegate.
    Submitted { label: String, command: CommandLine },
    /// Nothing was submitted; the message is informational.
    Info(String),
}

impl ActionOutcome {
    pub fn command(&self) -> Option<&CommandLine> {
        match self {
            ActionOutcome::Submitted { command, .. } => Some(command),
            ActionOutcome::Info(_) => None,
        }
    }
}

/// Orchestrates operations for one session.
pub struct Actions<S, D> {
    tools: Tools,
    queue: SharedStagingQueue,
    source: S,
    delegate: D,
}

impl<S, D> Actions<S, D>
where
    S: SelectionSource,
    D: ExecutionDelegate,
{
    pub fn new(tools: Tools, source: S, delegate: D) -> Self {
        Self::with_queue(tools, SharedStagingQueue::new(), source, delegate)
    }

    /// Stage into `queue`. Sessions given clones of the same queue see each other's marks.
    pub fn with_queue(tools: Tools, queue: SharedStagingQueue, source: S, delegate: D) -> Self {
        Self {
            tools,
            queue,
            source,
            delegate,
        }
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    pub fn queue(&self) -> &SharedStagingQueue {
        &self.queue
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    /// Report the disk usage of the selection.
    pub fn size(&self) -> ActionOutcome {
        let sources = self.source.selected_paths();
        let command = command::size(&self.tools.size, &sources);
        self.submit(format!("size of {}", describe(&sources)), command)
    }

    /// Copy the selection to `destination`.
    pub fn sync(&self, destination: &str, privilege: Privilege) -> ActionOutcome {
        self.transfer(destination, false, privilege)
    }

    /// Copy the selection to `destination`, deleting extraneous files there.
    pub fn mirror(&self, destination: &str, privilege: Privilege) -> ActionOutcome {
        self.transfer(destination, true, privilege)
    }

    /// Pack the selection into `archive`.
    pub fn archive(&self, archive: &str) -> ActionOutcome {
        let sources = self.source.selected_paths();
        let command = command::archive_create(&self.tools.archive_create, &sources, archive);
        self.submit(format!("archive {archive}"), command)
    }

    /// Extract the archive under the cursor, or the first selected file.
    pub fn extract(&self) -> ActionOutcome {
        let target = self
            .source
            .path_at_cursor()
            .or_else(|| self.source.selected_paths().into_iter().next());
        let Some(archive) = target else {
            return ActionOutcome::Info("No archive to extract".into());
        };
        let command = command::archive_extract(&self.tools.archive_extract, &archive);
        self.submit(format!("extract {}", archive.display()), command)
    }

    /// Fetch `urls` into `directory`.
    pub fn download(&self, urls: &[String], directory: &str) -> ActionOutcome {
        let command = command::download(&self.tools.download, urls, directory);
        let label = match urls {
            [single] => format!("download {single}"),
            _ => format!("download {} urls", urls.len()),
        };
        self.submit(label, command)
    }

    /// Stage the path under the cursor.
    pub fn mark(&mut self) -> ActionOutcome {
        match self.source.path_at_cursor() {
            Some(path) => self.mark_paths(vec![path]),
            None => ActionOutcome::Info("Nothing under cursor".into()),
        }
    }

    /// Stage every selected path.
    pub fn mark_selected(&mut self) -> ActionOutcome {
        let paths = self.source.selected_paths();
        self.mark_paths(paths)
    }

    /// Remove the path under the cursor from the staging queue.
    pub fn unmark(&mut self) -> ActionOutcome {
        match self.source.path_at_cursor() {
            Some(path) => self.unmark_paths(vec![path]),
            None => ActionOutcome::Info("Nothing under cursor".into()),
        }
    }

    /// Remove every selected path from the staging queue.
    pub fn unmark_selected(&mut self) -> ActionOutcome {
        let paths = self.source.selected_paths();
        self.unmark_paths(paths)
    }

    pub fn reset(&mut self) -> ActionOutcome {
        let cleared = self.queue.reset();
        ActionOutcome::Info(format!("Cleared {cleared} staged path(s)"))
    }

    /// Transfer every staged path to `destination` as one command and empty the queue.
    pub fn flush(&mut self, destination: &str, mirror: bool, privilege: Privilege) -> ActionOutcome {
        let transfer = self.tools.transfer(mirror, privilege);
        match self.queue.flush(&transfer, destination) {
            Some(command) => {
                let count = command
                    .args()
                    .iter()
                    .filter(|arg| matches!(arg, Arg::Word(_)))
                    .count();
                self.submit(format!("sync {count} staged to {destination}"), command)
            }
            None => ActionOutcome::Info("Nothing to transfer: staging queue is empty".into()),
        }
    }

    fn transfer(&self, destination: &str, mirror: bool, privilege: Privilege) -> ActionOutcome {
        let sources = self.source.selected_paths();
        let command = self
            .tools
            .transfer(mirror, privilege)
            .command(&sources, destination);
        self.submit(
            format!("sync {} to {destination}", describe(&sources)),
            command,
        )
    }

    fn mark_paths(&mut self, paths: PathList) -> ActionOutcome {
        let added = paths.iter().filter(|path| self.queue.mark(path)).count();
        ActionOutcome::Info(format!(
            "Marked {added} path(s); {} staged",
            self.queue.len()
        ))
    }

    fn unmark_paths(&mut self, paths: PathList) -> ActionOutcome {
        let removed = paths.iter().filter(|path| self.queue.unmark(path)).count();
        ActionOutcome::Info(format!(
            "Unmarked {removed} path(s); {} staged",
            self.queue.len()
        ))
    }

    fn submit(&self, label: String, command: CommandLine) -> ActionOutcome {
        tracing::debug!(label = %label, command = %command, "submitting job");
        self.delegate.submit(command.clone(), &label);
        ActionOutcome::Submitted { label, command }
    }
}

fn describe(paths: &[PathBuf]) -> String {
    match paths {
        [] => "nothing".into(),
        [single] => single.display().to_string(),
        _ => format!("{} files", paths.len()),
    }
}
