//! Domain-specific errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unbalanced quotes or trailing backslash")]
    UnbalancedQuoting,
}
