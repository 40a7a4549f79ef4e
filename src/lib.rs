// session-recovery - Resilient request execution and idempotent session recovery
// Author: kelexine (https://github.com/kelexine)

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod retry;
pub mod session;
pub mod utils;
