pub mod build;
pub mod cache;
pub mod config;
pub mod drivers;
pub mod mux;
pub mod publisher;
pub mod retry;

pub use build::build_publisher;
pub use cache::{resolve_driver_name, DriverCache};
pub use config::{parse_and_validate, DriverConfig};
pub use mux::PublisherMux;
pub use publisher::{Publisher, PublishEnvelope};
pub use retry::{run_with_retry, RetryPolicy};
