//! Integration test suite for the updater
//!
//! Drives the `updater` binary against throwaway installations. Every test
//! runs offline: remote endpoints point at a closed local port.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: argument handling and output modes
//! - **cancel**: deleting staged archives and the scheduled post-update step
//! - **install**: installing staged core and plugin archives
//! - **errors**: failures surfaced to the operator

#[path = "../common/mod.rs"]
mod common;

mod cancel;
mod cli;
mod errors;
mod install;
