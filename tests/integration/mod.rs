//! Integration tests for the genpipe pipeline

mod cli_commands;
mod saga_compensation;
mod sandbox_isolation;
mod scheduling;
mod support;
