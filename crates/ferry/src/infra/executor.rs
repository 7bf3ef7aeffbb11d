//! Execution delegates that run or print finished command lines.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;

use crate::app::actions::ExecutionDelegate;
use crate::app::command::CommandLine;

/// Progress of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started { label: String, command: String },
    Output { label: String, line: String },
    Finished { label: String, code: Option<i32>, success: bool },
    Failed { label: String, error: String },
}

/// Runs each command through `sh -c` on a background thread, streaming its output as
/// [`JobEvent`]s.
pub struct ShellExecutor {
    shell: String,
    events: Option<Sender<JobEvent>>,
    jobs: Mutex<JobTable>,
}

/// Handles of jobs still running, plus failures of jobs already reaped.
#[derive(Default)]
struct JobTable {
    running: Vec<JoinHandle<bool>>,
    failed: usize,
}

impl JobTable {
    /// Drop handles of finished jobs, counting the ones that failed.
    fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.running)
            .into_iter()
            .partition(|job| job.is_finished());
        self.running = running;
        self.failed += count_failures(finished);
    }
}

fn count_failures(jobs: Vec<JoinHandle<bool>>) -> usize {
    jobs.into_iter()
        .map(|job| job.join().unwrap_or(false))
        .filter(|success| !success)
        .count()
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".into(),
            events: None,
            jobs: Mutex::new(JobTable::default()),
        }
    }

    /// Forward job events to `sender`. Without a sender, output is logged.
    pub fn with_events(mut self, sender: Sender<JobEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Number of submitted jobs that have not finished yet.
    pub fn running(&self) -> usize {
        let mut jobs = self.jobs.lock();
        jobs.reap();
        jobs.running.len()
    }

    /// Block until every submitted job has finished. Returns the number of jobs that failed
    /// since the last call.
    pub fn wait(&self) -> usize {
        let (running, failed) = {
            let mut jobs = self.jobs.lock();
            (
                std::mem::take(&mut jobs.running),
                std::mem::take(&mut jobs.failed),
            )
        };
        failed + count_failures(running)
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionDelegate for ShellExecutor {
    fn submit(&self, command: CommandLine, label: &str) {
        let shell = self.shell.clone();
        let events = self.events.clone();
        let label = label.to_owned();

        let job = thread::spawn(move || match run_job(&shell, &command, &label, events.as_ref()) {
            Ok(status) => {
                tracing::info!(job = %label, status = %status, "job finished");
                emit(
                    events.as_ref(),
                    JobEvent::Finished {
                        label,
                        code: status.code(),
                        success: status.success(),
                    },
                );
                status.success()
            }
            Err(err) => {
                tracing::warn!(job = %label, error = %err, "job failed");
                emit(
                    events.as_ref(),
                    JobEvent::Failed {
                        label,
                        error: format!("{err:#}"),
                    },
                );
                false
            }
        });

        let mut jobs = self.jobs.lock();
        jobs.reap();
        jobs.running.push(job);
    }
}

fn run_job(
    shell: &str,
    command: &CommandLine,
    label: &str,
    events: Option<&Sender<JobEvent>>,
) -> Result<ExitStatus> {
    let line = command.to_string();
    let mut process = Command::new(shell);
    process
        .arg("-c")
        .arg(&line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = command.working_dir() {
        process.current_dir(dir);
    }

    let mut child = process
        .spawn()
        .with_context(|| format!("failed to spawn job: {line}"))?;
    emit(
        events,
        JobEvent::Started {
            label: label.to_owned(),
            command: line.clone(),
        },
    );

    let stdout = child.stdout.take().context("job stdout unavailable")?;
    let stderr = child.stderr.take().context("job stderr unavailable")?;

    let stderr_events = events.cloned();
    let stderr_label = label.to_owned();
    let stderr_reader =
        thread::spawn(move || forward_lines(stderr, &stderr_label, stderr_events.as_ref()));
    forward_lines(stdout, label, events);
    if stderr_reader.join().is_err() {
        tracing::warn!(job = %label, "stderr reader panicked");
    }

    child
        .wait()
        .with_context(|| format!("job did not exit cleanly: {line}"))
}

fn forward_lines(reader: impl Read, label: &str, events: Option<&Sender<JobEvent>>) {
    for line in BufReader::new(reader).lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::debug!(job = %label, error = %err, "stopped reading job output");
                break;
            }
        };
        match events {
            Some(sender) => emit(
                Some(sender),
                JobEvent::Output {
                    label: label.to_owned(),
                    line,
                },
            ),
            None => tracing::info!(job = %label, "{line}"),
        }
    }
}

fn emit(events: Option<&Sender<JobEvent>>, event: JobEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}

/// Writes commands to a sink instead of running them.
pub struct DryRun<W> {
    out: Mutex<W>,
    json: bool,
}

impl DryRun<std::io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(std::io::stdout(), json)
    }
}

impl<W: Write> DryRun<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out: Mutex::new(out),
            json,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn render(&self, command: &CommandLine, label: &str) -> Result<String> {
        if !self.json {
            return Ok(command.shell_line());
        }
        let preview = JobPreview {
            label,
            line: command.to_string(),
            command,
        };
        serde_json::to_string(&preview).context("failed to serialize command")
    }
}

impl<W: Write> ExecutionDelegate for DryRun<W> {
    fn submit(&self, command: CommandLine, label: &str) {
        let rendered = match self.render(&command, label) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::warn!(job = %label, error = %err, "failed to render command");
                return;
            }
        };
        if let Err(err) = writeln!(self.out.lock(), "{rendered}") {
            tracing::warn!(job = %label, error = %err, "failed to print command");
        }
    }
}

#[derive(Serialize)]
struct JobPreview<'a> {
    label: &'a str,
    line: String,
    command: &'a CommandLine,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc::channel;

    use crate::app::command::CommandBuilder;
    use crate::domain::model::ToolSpec;

    #[test]
    fn dry_run_prints_rendered_line() {
        let delegate = DryRun::new(Vec::new(), false);
        let command = CommandBuilder::new(&ToolSpec::new("du").with_args(["-sch"]))
            .word("/a b")
            .finish();
        delegate.submit(command, "size");
        let printed = String::from_utf8(delegate.into_inner()).unwrap();
        assert_eq!(printed, "du -sch '/a b'\n");
    }

    #[test]
    fn dry_run_keeps_working_directory() {
        let delegate = DryRun::new(Vec::new(), false);
        let command = CommandBuilder::new(&ToolSpec::new("wget"))
            .word("https://example.com/f.iso")
            .working_dir(Some("/srv/isos".into()))
            .finish();
        delegate.submit(command, "download");
        let printed = String::from_utf8(delegate.into_inner()).unwrap();
        assert_eq!(printed, "cd '/srv/isos' && wget 'https://example.com/f.iso'\n");
    }

    #[test]
    fn dry_run_json_includes_label_and_line() {
        let delegate = DryRun::new(Vec::new(), true);
        let command = CommandBuilder::new(&ToolSpec::new("du")).word("/a").finish();
        delegate.submit(command, "size");
        let printed = String::from_utf8(delegate.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(printed.trim()).unwrap();
        assert_eq!(value["label"], "size");
        assert_eq!(value["line"], "du '/a'");
        assert_eq!(value["command"]["program"], "du");
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_streams_output_and_status() {
        let (sender, receiver) = channel();
        let executor = ShellExecutor::new().with_events(sender);
        let temp = tempfile::tempdir().unwrap();
        let command = CommandBuilder::new(&ToolSpec::new("printf"))
            .word("%s\\n")
            .word("hello world")
            .working_dir(Some(temp.path().to_path_buf()))
            .finish();

        executor.submit(command, "greet");
        assert_eq!(executor.wait(), 0);
        drop(executor);

        let events: Vec<JobEvent> = receiver.iter().collect();
        assert!(matches!(&events[0], JobEvent::Started { label, .. } if label == "greet"));
        assert!(events.contains(&JobEvent::Output {
            label: "greet".into(),
            line: "hello world".into(),
        }));
        assert_eq!(
            events.last(),
            Some(&JobEvent::Finished {
                label: "greet".into(),
                code: Some(0),
                success: true,
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_counts_failures() {
        let executor = ShellExecutor::new();
        executor.submit(CommandBuilder::new(&ToolSpec::new("false")).finish(), "fail");
        executor.submit(CommandBuilder::new(&ToolSpec::new("true")).finish(), "pass");
        assert_eq!(executor.wait(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn finished_jobs_are_reaped_but_failures_are_kept() {
        let executor = ShellExecutor::new();
        executor.submit(CommandBuilder::new(&ToolSpec::new("false")).finish(), "fail");

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while executor.running() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(executor.running(), 0);

        executor.submit(CommandBuilder::new(&ToolSpec::new("true")).finish(), "pass");
        assert!(executor.jobs.lock().running.len() <= 1);
        assert_eq!(executor.wait(), 1);
        assert_eq!(executor.wait(), 0);
    }
}
