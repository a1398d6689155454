//! CLI command implementations.
//!
//! Each command returns an [`ExitCode`](warden_core::cli::ExitCode) and
//! writes its report to stdout in the selected output format.

pub mod apply;
pub mod common;
pub mod policy;
pub mod validate;
