//! CLI Commands

pub mod clean;
pub mod generate;
pub mod install;
