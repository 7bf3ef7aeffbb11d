//! Classifying and formatting transfer destinations.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::app::quote::quote_path;
use crate::domain::model::{Destination, RemoteScheme};

/// Resolve a user supplied destination into a single command-line token.
///
/// Remote destinations (`/scp:` or `/ssh:` prefixes) lose their prefix, get every space escaped
/// with a backslash, and are wrapped in a literal pair of single quotes. Anything else is treated
/// as a local path, made absolute, and shell-quoted.
pub fn resolve(destination: &str) -> String {
    Destination::parse(destination).token()
}

impl Destination {
    /// Classify `destination` by literal prefix. The first matching scheme wins; a local path that
    /// happens to start with a scheme prefix is classified as remote.
    pub fn parse(destination: &str) -> Self {
        for scheme in RemoteScheme::ALL {
            if let Some(rest) = destination.strip_prefix(scheme.prefix()) {
                return Destination::Remote {
                    scheme,
                    rest: rest.to_owned(),
                };
            }
        }

        Destination::Local {
            path: absolute_form(Path::new(destination)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Destination::Remote { .. })
    }

    /// Render the destination as it appears on the command line.
    pub fn token(&self) -> String {
        match self {
            Destination::Local { path } => quote_path(path),
            Destination::Remote { rest, .. } => format!("'{}'", rest.replace(' ', "\\ ")),
        }
    }
}

/// Make `path` absolute without touching the filesystem.
///
/// A leading `~` is replaced by the home directory, relative paths are joined onto the current
/// working directory, and `.`/`..` components are collapsed lexically. The empty path resolves to
/// the working directory. When the home or working directory is unknown the path is only
/// normalised.
pub fn absolute_form(path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(err) => {
                tracing::debug!(error = %err, "working directory unavailable");
                expanded
            }
        }
    };
    normalize(&joined)
}

fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs_next::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            Component::Normal(part) => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
