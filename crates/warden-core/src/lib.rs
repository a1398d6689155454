//! Core types, policy, and errors for the script warden engine.
//!
//! This crate provides the foundational types shared by the runtime and the
//! command line front end.
//!
//! # Architecture
//!
//! The core consists of:
//! - Domain types (`Record`, `Script`, `BackendKind`)
//! - The two-level error taxonomy (`ValidationError`, `ExecutionError`)
//! - Engine policy configuration with profiles
//! - The batch `ExecutionTrace`
//! - The `ScriptTransformer` seam

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod types;

pub mod cli;
pub mod config;
pub mod trace;
pub mod traits;

pub use config::{EnginePolicy, GuardLimits, PolicyProfile};
pub use error::{Error, ExecutionError, ExecutionErrorKind, Result, ValidationError};
pub use trace::{ExecutionTrace, FieldChange, RecordError, SampleDiff};
pub use traits::{ScriptTransformer, TransformOutput};
pub use types::{BackendKind, Record, Script, ScriptDigest};
