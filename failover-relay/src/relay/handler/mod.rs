pub mod context;
pub mod coordinator;
pub mod types;

pub use context::CallContext;
pub use coordinator::RetryCoordinator;
pub use types::*;
