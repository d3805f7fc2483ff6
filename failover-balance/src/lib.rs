//! Failover Balance Library
//!
//! This library provides the node routing building blocks for the failover client including:
//! - Immutable node lists
//! - Pin-until-error and round-robin node selection
//! - Failed node cooldown
//! - Golden ratio backoff
//! - Shared failure tracking and switch decisions

pub mod loadbalance;

// Re-export commonly used types
pub use loadbalance::{
    BackoffPolicy, CooldownCache, CooldownStats, Decision, ExhaustionReason, FailureTracker,
    NodeList, NodeSelector, RoutingConfig, RoutingState, SelectedNode,
};
