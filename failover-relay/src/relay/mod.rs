pub mod handler;
pub mod manager;

pub use handler::{CallContext, RetryCoordinator, RouteError};
pub use manager::RouterManager;
