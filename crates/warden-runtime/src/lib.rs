//! Sandboxed execution engine for record transformation scripts.
//!
//! A script passes through three stages:
//!
//! 1. [`Validator`]: static checks on the parsed script (forbidden
//!    statements, calls and attributes), without running anything.
//! 2. [`Compiler`]: re-validates and produces a [`CompiledUnit`], on the
//!    restricted backend when available.
//! 3. [`ExecutionHost`]: runs the unit against one record in an isolated
//!    worker with a hard time budget.
//!
//! [`BatchOrchestrator`] ties the stages together for a batch of records and
//! implements [`warden_core::ScriptTransformer`].
//!
//! Scripts are written in [Rhai](https://rhai.rs). They see only the
//! [`SafeRuntimeLibrary`], a working copy of the record bound to `record`,
//! and an optional `result` output binding.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod capture;
pub mod compiler;
pub mod convert;
pub mod library;
pub mod orchestrator;
pub mod sandbox;
pub mod security;
pub mod validator;

pub use capture::OutputCapture;
pub use compiler::{CompiledUnit, Compiler, RESTRICTED_AVAILABLE};
pub use library::SafeRuntimeLibrary;
pub use orchestrator::BatchOrchestrator;
pub use sandbox::{ExecutionHost, ExecutionOutcome, HostStats};
pub use validator::Validator;
