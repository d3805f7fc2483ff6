//! Failover Core Library
//!
//! This library provides core functionality for the failover client including:
//! - Configuration management
//! - The transport boundary and its error taxonomy
//! - A reqwest based HTTP transport

pub mod config;
pub mod client;

// Re-export commonly used types
pub use config::model::{Config, GlobalSettings, NodeSelectionStrategy, ServiceConfig};
pub use client::{
    FailureClass, HttpTransport, RouteRequest, RouteResponse, Transport, TransportError,
};
