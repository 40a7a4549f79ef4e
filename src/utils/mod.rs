//! Utility functions and helpers for session-recovery.
//!
//! This module provides cross-cutting concerns such as structured logging
//! and keeping bearer tokens out of log output.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization, token redaction and fingerprints.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
