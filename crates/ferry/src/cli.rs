//! Command-line entry points.

use std::io;
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, channel};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::actions::{ActionOutcome, Actions, ExecutionDelegate};
use crate::app::command::{CommandLine, Privilege};
use crate::domain::model::{PathList, Tools};
use crate::infra::config::Config;
use crate::infra::executor::{DryRun, JobEvent, ShellExecutor};
use crate::ui::shell::StagingShell;

#[derive(Debug, Parser)]
#[command(
    name = "ferry",
    author,
    version,
    about = "Hand long-running file operations to external tools",
    long_about = None
)]
pub struct Cli {
    /// Print commands instead of running them.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Print commands as JSON instead of running them.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
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
    /// Interactive session with a staging queue.
    Shell,
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments shared by the CLI and the interactive shell.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct PathArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SyncArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    #[arg(long, short)]
    pub to: String,
    #[command(flatten)]
    pub transfer: TransferArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Args)]
pub struct TransferArgs {
    /// Delete files at the destination that are missing from the sources.
    #[arg(long)]
    pub mirror: bool,
    /// Run the transfer with elevated privileges.
    #[arg(long)]
    pub sudo: bool,
}

impl TransferArgs {
    pub fn privilege(&self) -> Privilege {
        Privilege::from_sudo(self.sudo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ArchiveArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    #[arg(long, short)]
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ExtractArgs {
    pub archive: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DownloadArgs {
    #[arg(required = true)]
    pub urls: Vec<String>,
    #[arg(long, short, default_value = ".")]
    pub to: String,
}

/// Where built commands go: a background shell or stdout.
pub enum Delegate {
    Run(ShellExecutor),
    Print(DryRun<Stdout>),
}

impl Delegate {
    /// Wait for running jobs. Returns the number that failed.
    pub fn wait(&self) -> usize {
        match self {
            Delegate::Run(executor) => executor.wait(),
            Delegate::Print(_) => 0,
        }
    }
}

impl ExecutionDelegate for Delegate {
    fn submit(&self, command: CommandLine, label: &str) {
        match self {
            Delegate::Run(executor) => executor.submit(command, label),
            Delegate::Print(printer) => printer.submit(command, label),
        }
    }
}

/// Execute the parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let Cli {
        dry_run,
        json,
        command,
    } = cli;

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "ferry", &mut io::stdout());
        return Ok(());
    }

    let tools = Config::load()
        .context("failed to load configuration")?
        .tools();
    let (delegate, printer) = delegate_for(dry_run || json, json);

    let delegate = match command {
        Commands::Shell => {
            let mut shell = StagingShell::new(tools, delegate);
            shell.run()?;
            shell.into_delegate()
        }
        Commands::Size(args) => run_once(tools, args.paths, delegate, |actions| actions.size()),
        Commands::Sync(args) => {
            let SyncArgs {
                paths,
                to,
                transfer,
            } = args;
            run_once(tools, paths, delegate, |actions| {
                if transfer.mirror {
                    actions.mirror(&to, transfer.privilege())
                } else {
                    actions.sync(&to, transfer.privilege())
                }
            })
        }
        Commands::Archive(args) => {
            run_once(tools, args.paths, delegate, |actions| actions.archive(&args.to))
        }
        Commands::Extract(args) => {
            run_once(tools, vec![args.archive], delegate, |actions| actions.extract())
        }
        Commands::Download(args) => run_once(tools, PathList::new(), delegate, |actions| {
            actions.download(&args.urls, &args.to)
        }),
        Commands::Completions { .. } => return Ok(()),
    };

    let failed = delegate.wait();
    drop(delegate);
    if let Some(printer) = printer
        && printer.join().is_err()
    {
        tracing::warn!("output printer panicked");
    }

    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn run_once<F>(tools: Tools, selection: PathList, delegate: Delegate, action: F) -> Delegate
where
    F: FnOnce(&Actions<PathList, Delegate>) -> ActionOutcome,
{
    let actions = Actions::new(tools, selection, delegate);
    if let ActionOutcome::Info(message) = action(&actions) {
        println!("{message}");
    }
    actions.into_delegate()
}

fn delegate_for(print_only: bool, json: bool) -> (Delegate, Option<JoinHandle<()>>) {
    if print_only {
        return (Delegate::Print(DryRun::stdout(json)), None);
    }
    let (sender, receiver) = channel();
    let executor = ShellExecutor::new().with_events(sender);
    (Delegate::Run(executor), Some(spawn_printer(receiver)))
}

fn spawn_printer(receiver: Receiver<JobEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver {
            match event {
                JobEvent::Started { label, command } => eprintln!("[{label}] $ {command}"),
                JobEvent::Output { line, .. } => println!("{line}"),
                JobEvent::Finished {
                    label,
                    code,
                    success,
                } => {
                    if success {
                        eprintln!("[{label}] done");
                    } else {
                        let code = code.map_or_else(|| "a signal".to_string(), |c| c.to_string());
                        eprintln!("[{label}] exited with {code}");
                    }
                }
                JobEvent::Failed { label, error } => eprintln!("[{label}] {error}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "ferry",
            "--dry-run",
            "sync",
            "/a",
            "/b",
            "--to",
            "/scp:host:/backup/",
            "--mirror",
            "--sudo",
        ])
        .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
                assert_eq!(args.to, "/scp:host:/backup/");
                assert!(args.transfer.mirror && args.transfer.sudo);
                assert_eq!(args.transfer.privilege(), Privilege::Elevated);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["ferry", "size", "/a", "--json"]).unwrap();
        assert!(cli.json);
    }

    #[test]
    fn sync_requires_paths_and_destination() {
        assert!(Cli::try_parse_from(["ferry", "sync", "--to", "/b"]).is_err());
        assert!(Cli::try_parse_from(["ferry", "sync", "/a"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
