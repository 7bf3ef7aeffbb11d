//! Interactive front end.

pub mod shell;
