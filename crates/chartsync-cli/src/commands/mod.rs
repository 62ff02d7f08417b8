//! CLI commands

pub mod deps;
pub mod inspect;
