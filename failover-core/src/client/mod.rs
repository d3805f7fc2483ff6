pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpTransport;
pub use traits::*;
pub use types::*;
