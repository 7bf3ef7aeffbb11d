//! Building command lines for external tools.
//!
//! Commands are assembled as structured values and only rendered into a single shell line when
//! handed to an execution delegate, so every argument is quoted exactly once.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::app::quote::{quote, quote_path};
use crate::app::target::absolute_form;
use crate::domain::model::{Destination, ToolSpec, Tools};

/// Whether a transfer runs with elevated privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    User,
    Elevated,
}

impl Privilege {
    /// `Elevated` when the caller asked for `--sudo`.
    pub fn from_sudo(sudo: bool) -> Self {
        if sudo {
            Privilege::Elevated
        } else {
            Privilege::User
        }
    }
}

/// A single argument of a [`CommandLine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Arg {
    /// Inserted verbatim (configured flags).
    Flag(String),
    /// Shell-quoted on render.
    Word(String),
    /// Resolved transfer destination.
    Target(Destination),
}

impl Arg {
    /// The argument as it appears on the rendered line.
    pub fn token(&self) -> String {
        match self {
            Arg::Flag(flag) => flag.clone(),
            Arg::Word(word) => quote(word),
            Arg::Target(destination) => destination.token(),
        }
    }
}

/// Immutable command handed to an execution delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    elevate: Option<String>,
    program: String,
    args: Vec<Arg>,
    working_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Directory the command expects to run in, if it depends on one.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn is_elevated(&self) -> bool {
        self.elevate.is_some()
    }

    /// Rendered tokens in order, including the elevation prefix.
    pub fn tokens(&self) -> Vec<String> {
        self.elevate
            .iter()
            .cloned()
            .chain(std::iter::once(self.program.clone()))
            .chain(self.args.iter().map(Arg::token))
            .collect()
    }

    /// Single line that reproduces the command from any directory: the rendered command,
    /// preceded by `cd '<dir>' &&` when it depends on a working directory.
    pub fn shell_line(&self) -> String {
        match &self.working_dir {
            Some(dir) => format!("cd {} && {self}", quote_path(dir)),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(" "))
    }
}

/// Incremental builder for [`CommandLine`] values.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    line: CommandLine,
}

impl CommandBuilder {
    /// Start a command for `tool`, including its fixed arguments.
    pub fn new(tool: &ToolSpec) -> Self {
        Self {
            line: CommandLine {
                elevate: None,
                program: tool.program.clone(),
                args: tool.args.iter().cloned().map(Arg::Flag).collect(),
                working_dir: None,
            },
        }
    }

    pub fn elevate(mut self, prefix: Option<&str>) -> Self {
        self.line.elevate = prefix.map(str::to_owned);
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.line.args.push(Arg::Flag(flag.into()));
        self
    }

    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.line
            .args
            .extend(flags.into_iter().map(|flag| Arg::Flag(flag.into())));
        self
    }

    pub fn word(mut self, word: impl Into<String>) -> Self {
        self.line.args.push(Arg::Word(word.into()));
        self
    }

    pub fn path(self, path: &Path) -> Self {
        self.word(path.to_string_lossy())
    }

    pub fn paths<'a, I>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        paths.into_iter().fold(self, |builder, path| builder.path(path))
    }

    pub fn destination(mut self, destination: &str) -> Self {
        self.line
            .args
            .push(Arg::Target(Destination::parse(destination)));
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.line.working_dir = dir;
        self
    }

    pub fn finish(self) -> CommandLine {
        tracing::debug!(command = %self.line, "built command");
        self.line
    }
}

/// Compose `tool`, its fixed arguments, `extra_flags`, each quoted source, and the resolved
/// destination, in that order.
///
/// Sources are not validated; an empty list yields a command without source arguments.
pub fn build(
    tool: &ToolSpec,
    sources: &[PathBuf],
    destination: Option<&str>,
    extra_flags: &[String],
) -> CommandLine {
    let builder = CommandBuilder::new(tool)
        .flags(extra_flags.iter().cloned())
        .paths(sources);
    let builder = match destination {
        Some(destination) => builder.destination(destination),
        None => builder,
    };
    builder.finish()
}

/// Size inquiry over `sources`.
pub fn size(tool: &ToolSpec, sources: &[PathBuf]) -> CommandLine {
    build(tool, sources, None, &[])
}

/// Archive `sources` into `archive`.
///
/// Members are named by their base name only, so the command runs in the first source's parent
/// directory.
pub fn archive_create(tool: &ToolSpec, sources: &[PathBuf], archive: &str) -> CommandLine {
    let working_dir = sources
        .first()
        .map(|first| absolute_form(first))
        .and_then(|first| first.parent().map(Path::to_path_buf));

    let builder = CommandBuilder::new(tool).word(
        absolute_form(Path::new(archive))
            .to_string_lossy()
            .into_owned(),
    );
    sources
        .iter()
        .fold(builder, |builder, source| builder.word(member_name(source)))
        .working_dir(working_dir)
        .finish()
}

/// Extract `archive` into a directory named after the archive without its extension.
pub fn archive_extract(tool: &ToolSpec, archive: &Path) -> CommandLine {
    let absolute = absolute_form(archive);
    let builder = CommandBuilder::new(tool).path(&absolute);
    let builder = match &tool.output_flag {
        Some(flag) => builder.flag(flag.clone()),
        None => builder,
    };
    builder
        .word(output_dir_name(&absolute))
        .working_dir(absolute.parent().map(Path::to_path_buf))
        .finish()
}

/// Download each of `urls` into `directory`.
pub fn download(tool: &ToolSpec, urls: &[String], directory: &str) -> CommandLine {
    urls.iter()
        .fold(CommandBuilder::new(tool), |builder, url| builder.word(url.clone()))
        .working_dir(Some(absolute_form(Path::new(directory))))
        .finish()
}

/// Output directory name for an extracted archive: base name with the extension stripped.
pub fn output_dir_name(archive: &Path) -> String {
    archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| member_name(archive))
}

fn member_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A configured sync invocation: tool, extra flags, and optional elevation.
#[derive(Debug, Clone, Copy)]
pub struct Transfer<'a> {
    tool: &'a ToolSpec,
    extra_flags: &'a [String],
    elevate: Option<&'a str>,
}

impl<'a> Transfer<'a> {
    pub fn new(tool: &'a ToolSpec) -> Self {
        Self {
            tool,
            extra_flags: &[],
            elevate: None,
        }
    }

    pub fn with_flags(mut self, flags: &'a [String]) -> Self {
        self.extra_flags = flags;
        self
    }

    pub fn elevated(mut self, prefix: &'a str) -> Self {
        self.elevate = Some(prefix);
        self
    }

    /// Build the transfer of `sources` to `destination`.
    pub fn command(&self, sources: &[PathBuf], destination: &str) -> CommandLine {
        CommandBuilder::new(self.tool)
            .elevate(self.elevate)
            .flags(self.extra_flags.iter().cloned())
            .paths(sources)
            .destination(destination)
            .finish()
    }
}

impl Tools {
    /// Sync transfer, optionally mirroring deletions and optionally elevated.
    pub fn transfer(&self, mirror: bool, privilege: Privilege) -> Transfer<'_> {
        let transfer = Transfer::new(&self.sync);
        let transfer = if mirror {
            transfer.with_flags(&self.mirror_flags)
        } else {
            transfer
        };
        match privilege {
            Privilege::User => transfer,
            Privilege::Elevated => transfer.elevated(&self.elevate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<PathBuf> {
        vec!["/a/f1.txt".into(), "/a/f2.txt".into()]
    }

    #[test]
    fn builds_in_documented_order() {
        let tool = ToolSpec::new("rsync").with_args(["-az"]);
        let command = build(
            &tool,
            &sources(),
            Some("/scp:host:/backup/"),
            &["--delete".to_string()],
        );
        assert_eq!(
            command.to_string(),
            "rsync -az --delete '/a/f1.txt' '/a/f2.txt' 'host:/backup/'"
        );
        assert!(!command.is_elevated());
    }

    #[test]
    fn build_without_destination_or_sources() {
        let tool = ToolSpec::new("du").with_args(["-sch"]);
        assert_eq!(build(&tool, &[], None, &[]).to_string(), "du -sch");
    }

    #[test]
    fn sources_with_spaces_stay_single_arguments() {
        let tool = ToolSpec::new("du");
        let command = size(&tool, &["/a/my file.txt".into()]);
        assert_eq!(command.to_string(), "du '/a/my file.txt'");
        assert_eq!(command.args(), &[Arg::Word("/a/my file.txt".into())]);
    }

    #[test]
    fn transfer_scenario_with_and_without_elevation() {
        let tools = Tools::default();
        let plain = tools
            .transfer(false, Privilege::User)
            .command(&sources(), "/scp:host:/backup/");
        let line = plain.to_string();
        assert!(line.starts_with("rsync "));
        assert!(line.ends_with("'/a/f1.txt' '/a/f2.txt' 'host:/backup/'"));

        let elevated = tools
            .transfer(false, Privilege::Elevated)
            .command(&sources(), "/scp:host:/backup/");
        assert!(elevated.is_elevated());
        assert!(elevated.to_string().starts_with("sudo rsync "));
        assert_eq!(elevated.tokens()[0], "sudo");
    }

    #[test]
    fn mirror_transfer_adds_configured_flags() {
        let tools = Tools::default();
        let command = tools
            .transfer(true, Privilege::User)
            .command(&sources(), "/tmp/out");
        assert_eq!(
            command.to_string(),
            "rsync -az --info=progress2 --delete '/a/f1.txt' '/a/f2.txt' '/tmp/out'"
        );
    }

    #[test]
    fn archive_create_uses_base_names_and_parent_dir() {
        let tool = ToolSpec::new("zip").with_args(["-r"]);
        let command = archive_create(
            &tool,
            &["/a/docs".into(), "/a/notes file.txt".into()],
            "/b/out.zip",
        );
        assert_eq!(
            command.to_string(),
            "zip -r '/b/out.zip' 'docs' 'notes file.txt'"
        );
        assert_eq!(command.working_dir(), Some(Path::new("/a")));
        assert_eq!(
            command.shell_line(),
            "cd '/a' && zip -r '/b/out.zip' 'docs' 'notes file.txt'"
        );
    }

    #[test]
    fn archive_extract_derives_output_directory() {
        let tool = ToolSpec::new("unzip").with_output_flag("-d");
        let command = archive_extract(&tool, Path::new("/a/archive.zip"));
        assert_eq!(command.to_string(), "unzip '/a/archive.zip' -d 'archive'");
        assert_eq!(command.args().last(), Some(&Arg::Word("archive".into())));
        assert_eq!(command.working_dir(), Some(Path::new("/a")));
    }

    #[test]
    fn archive_extract_without_output_flag() {
        let tool = ToolSpec::new("tar").with_args(["-xf"]);
        let command = archive_extract(&tool, Path::new("/a/data.tar"));
        assert_eq!(command.to_string(), "tar -xf '/a/data.tar' 'data'");
    }

    #[test]
    fn output_dir_name_strips_only_last_extension() {
        assert_eq!(output_dir_name(Path::new("/a/archive.zip")), "archive");
        assert_eq!(output_dir_name(Path::new("/a/bundle.tar.gz")), "bundle.tar");
        assert_eq!(output_dir_name(Path::new("/a/README")), "README");
    }

    #[test]
    fn download_runs_in_target_directory() {
        let tool = ToolSpec::new("wget").with_args(["-c"]);
        let command = download(
            &tool,
            &["https://example.com/a file.iso".into()],
            "/tmp/downloads/",
        );
        assert_eq!(command.to_string(), "wget -c 'https://example.com/a file.iso'");
        assert_eq!(command.working_dir(), Some(Path::new("/tmp/downloads")));
        assert_eq!(
            command.shell_line(),
            "cd '/tmp/downloads' && wget -c 'https://example.com/a file.iso'"
        );
    }

    #[test]
    fn shell_line_without_working_dir_is_the_command() {
        let command = size(&ToolSpec::new("du"), &["/a".into()]);
        assert_eq!(command.shell_line(), command.to_string());
    }

    #[test]
    fn identical_inputs_render_identically() {
        let tools = Tools::default();
        let first = tools.transfer(true, Privilege::Elevated).command(&sources(), "/x");
        let second = tools.transfer(true, Privilege::Elevated).command(&sources(), "/x");
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn serializes_structured_arguments() {
        let command = build(&ToolSpec::new("rsync"), &["/a".into()], Some("/ssh:h:/b"), &[]);
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["program"], "rsync");
        assert_eq!(json["args"][0]["kind"], "word");
        assert_eq!(json["args"][1]["kind"], "target");
        assert_eq!(json["args"][1]["value"]["kind"], "remote");
        assert_eq!(json["args"][1]["value"]["rest"], "h:/b");
    }
}
