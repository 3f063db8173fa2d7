//! Subcommand implementations.

pub mod compare;
pub mod edit;
pub mod inspect;
