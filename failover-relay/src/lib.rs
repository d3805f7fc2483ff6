//! Failover Relay Library
//!
//! This library provides request routing for the failover client including:
//! - The retry coordinator that routes each call to a replica
//! - Per-call attempt bookkeeping
//! - A manager holding one independent router per configured service

pub mod relay;

// Re-export commonly used types
pub use relay::{CallContext, RetryCoordinator, RouteError, RouterManager};
pub use tokio_util::sync::CancellationToken;
