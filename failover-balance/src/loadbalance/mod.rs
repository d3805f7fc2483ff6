pub mod backoff;
pub mod cooldown;
pub mod node_list;
pub mod routing_config;
pub mod selector;
pub mod tracker;


pub use backoff::{compute_delay, BackoffPolicy, GOLDEN_RATIO};
pub use cooldown::{CooldownCache, CooldownStats};
pub use node_list::NodeList;
pub use routing_config::RoutingConfig;
pub use selector::{NodeSelector, SelectedNode};
pub use tracker::{Decision, ExhaustionReason, FailureTracker, RoutingState};
