//! genpipe: code generation pipeline orchestration
//!
//! A declarative project configuration is turned into an intermediate representation by
//! dependency-ordered fragment helpers, passed through a transactional chain of extension hooks,
//! and handed to builder helpers that queue the generated files.

pub mod builtin;
pub mod cli;
pub mod config;
pub mod error;
pub mod helper;
pub mod ir;
pub mod logging;
pub mod pipeline;
pub mod reporter;
pub mod sandbox;
pub mod workspace;
pub mod writer;

pub use error::{ErrorKind, PipelineError};
pub use pipeline::{Pipeline, RunOptions, RunResult};
