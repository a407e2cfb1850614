//! Shared tracing setup for processes and tests using the repositories.
//!
//! Repository adapters only emit `tracing` events (`repository query`,
//! `unit of work committed`, ...). Installing a subscriber is left to the
//! binary, which calls [`init`] once at startup.

pub mod tracing;

pub use crate::tracing::{LogFormat, init, init_for_tests, init_with};
