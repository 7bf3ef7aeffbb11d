//! Interactive shell keeping a staging queue for the lifetime of the session.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Args, Parser};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use crate::app::actions::{ActionOutcome, Actions, ExecutionDelegate};
use crate::app::quote::split_words;
use crate::cli::{ArchiveArgs, DownloadArgs, ExtractArgs, PathArgs, SyncArgs, TransferArgs};
use crate::domain::model::{PathList, Tools};

/// One line of shell input. The one-shot verbs take the same arguments as the CLI.
#[derive(Debug, Parser)]
#[command(name = "ferry", no_binary_name = true, disable_version_flag = true)]
enum ShellCommand {
    /// Stage paths for a batched transfer.
    Mark(PathArgs),
    /// Remove staged paths.
    Unmark(PathArgs),
    /// Show staged paths.
    #[command(visible_alias = "ls")]
    List,
    /// Clear the staging queue.
    Reset,
    /// Transfer staged paths as one command.
    Flush(FlushArgs),
    /// Report disk usage of paths.
    Size(PathArgs),
    /// Copy paths to a local or remote (/scp:, /ssh:) destination.
    Sync(SyncArgs),
    /// Pack paths into an archive.
    Archive(ArchiveArgs),
    /// Extract an archive next to itself.
    Extract(ExtractArgs),
    /// Download urls into a directory.
    Download(DownloadArgs),
    /// Leave the shell.
    #[command(visible_alias = "exit")]
    Quit,
}

#[derive(Debug, Args)]
struct FlushArgs {
    destination: String,
    #[command(flatten)]
    transfer: TransferArgs,
}

/// Line-oriented front end over [`Actions`]. Each command's arguments become the selection.
pub struct StagingShell<D> {
    actions: Actions<PathList, D>,
    should_quit: bool,
}

impl<D: ExecutionDelegate> StagingShell<D> {
    pub fn new(tools: Tools, delegate: D) -> Self {
        Self::with_actions(Actions::new(tools, PathList::new(), delegate))
    }

    /// Drive existing actions, e.g. ones sharing their staging queue with another session.
    pub fn with_actions(actions: Actions<PathList, D>) -> Self {
        Self {
            actions,
            should_quit: false,
        }
    }

    pub fn actions(&self) -> &Actions<PathList, D> {
        &self.actions
    }

    pub fn into_delegate(self) -> D {
        self.actions.into_delegate()
    }

    /// Read commands until `quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut editor = Reedline::create();
        println!("Type 'help' for commands.");

        while !self.should_quit {
            let prompt = DefaultPrompt::new(
                DefaultPromptSegment::Basic(format!("ferry [{}]", self.actions.queue().len())),
                DefaultPromptSegment::Empty,
            );
            match editor.read_line(&prompt).context("failed to read input")? {
                Signal::Success(line) => match self.execute_command(&line) {
                    Ok(Some(ActionOutcome::Info(message))) => println!("{message}"),
                    Ok(_) => {}
                    Err(err) => match err.downcast_ref::<clap::Error>() {
                        Some(usage) => eprint!("{}", usage.render()),
                        None => eprintln!("error: {err:#}"),
                    },
                },
                Signal::CtrlC => {}
                Signal::CtrlD => self.should_quit = true,
            }
        }
        Ok(())
    }

    /// Execute one command line. Returns `None` for blank input and `quit`.
    pub fn execute_command(&mut self, line: &str) -> Result<Option<ActionOutcome>> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(None);
        }
        let command = match ShellCommand::try_parse_from(&words) {
            Ok(command) => command,
            Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp) => {
                return Ok(Some(ActionOutcome::Info(err.render().to_string())));
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = match command {
            ShellCommand::Mark(args) => {
                self.select(args.paths);
                self.actions.mark_selected()
            }
            ShellCommand::Unmark(args) => {
                self.select(args.paths);
                self.actions.unmark_selected()
            }
            ShellCommand::List => ActionOutcome::Info(self.describe_queue()),
            ShellCommand::Reset => self.actions.reset(),
            ShellCommand::Flush(args) => self.actions.flush(
                &args.destination,
                args.transfer.mirror,
                args.transfer.privilege(),
            ),
            ShellCommand::Size(args) => {
                self.select(args.paths);
                self.actions.size()
            }
            ShellCommand::Sync(args) => {
                self.select(args.paths);
                if args.transfer.mirror {
                    self.actions.mirror(&args.to, args.transfer.privilege())
                } else {
                    self.actions.sync(&args.to, args.transfer.privilege())
                }
            }
            ShellCommand::Archive(args) => {
                self.select(args.paths);
                self.actions.archive(&args.to)
            }
            ShellCommand::Extract(args) => {
                self.select(vec![args.archive]);
                self.actions.extract()
            }
            ShellCommand::Download(args) => self.actions.download(&args.urls, &args.to),
            ShellCommand::Quit => {
                self.should_quit = true;
                return Ok(None);
            }
        };
        Ok(Some(outcome))
    }

    fn select(&mut self, paths: PathList) {
        *self.actions.source_mut() = paths;
    }

    fn describe_queue(&self) -> String {
        let staged = self.actions.queue().snapshot();
        if staged.is_empty() {
            return "Staging queue is empty".into();
        }
        let mut description = format!("{} staged:", staged.len());
        for path in &staged {
            description.push_str("\n  ");
            description.push_str(&path.display().to_string());
        }
        description
    }
}
