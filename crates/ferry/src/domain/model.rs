//! Domain models for tools, destinations, and staged paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Ordered paths in the order the user selected them.
pub type PathList = Vec<PathBuf>;

/// An external program and the arguments it is always invoked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag introducing a generated output location, e.g. `-d` for `unzip`.
    #[serde(default)]
    pub output_flag: Option<String>,
}

impl ToolSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_flag: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_flag(mut self, flag: impl Into<String>) -> Self {
        self.output_flag = Some(flag.into());
        self
    }
}

/// Remote schemes recognised at the start of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteScheme {
    /// Generic remote copy, `/scp:host:path`.
    Scp,
    /// Secure shell, `/ssh:host:path`.
    Ssh,
}

impl RemoteScheme {
    /// Schemes in the order they are tested against a destination.
    pub const ALL: [RemoteScheme; 2] = [RemoteScheme::Scp, RemoteScheme::Ssh];

    /// Literal prefix including its trailing delimiter.
    pub fn prefix(&self) -> &'static str {
        match self {
            RemoteScheme::Scp => "/scp:",
            RemoteScheme::Ssh => "/ssh:",
        }
    }
}

/// A transfer destination after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Destination {
    /// Absolute, lexically normalised local path.
    Local { path: PathBuf },
    /// Remote locator with the scheme prefix removed, e.g. `host:/backup/`.
    Remote { scheme: RemoteScheme, rest: String },
}

/// Tool table for every supported operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub size: ToolSpec,
    pub sync: ToolSpec,
    pub archive_create: ToolSpec,
    pub archive_extract: ToolSpec,
    pub download: ToolSpec,
    /// Extra flags appended to sync invocations that mirror deletions.
    pub mirror_flags: Vec<String>,
    /// Program prefixed to elevated transfers.
    pub elevate: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            size: ToolSpec::new("du").with_args(["-sch"]),
            sync: ToolSpec::new("rsync").with_args(["-az", "--info=progress2"]),
            archive_create: ToolSpec::new("zip").with_args(["-r"]),
            archive_extract: ToolSpec::new("unzip")
                .with_args(["-o"])
                .with_output_flag("-d"),
            download: ToolSpec::new("wget").with_args(["-c"]),
            mirror_flags: vec!["--delete".into()],
            elevate: "sudo".into(),
        }
    }
}
