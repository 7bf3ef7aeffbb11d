//! POSIX shell quoting and word splitting.

use std::path::Path;

use crate::domain::errors::DomainError;

/// Quote `value` so a POSIX shell reads it back as exactly one argument.
///
/// The whole value is wrapped in single quotes; embedded single quotes are closed, escaped, and
/// reopened (`'\''`). Every other byte, including newlines and multi-byte text, is literal inside
/// single quotes.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote a filesystem path. Non UTF-8 components are replaced lossily.
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Split a line into words the way a POSIX shell tokenizes plain arguments.
///
/// Expansions are not performed and a `#` at the start of a word begins a comment.
pub fn split_words(line: &str) -> Result<Vec<String>, DomainError> {
    shlex::split(line).ok_or(DomainError::UnbalancedQuoting)
}
