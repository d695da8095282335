pub mod auth;
pub mod error;
pub mod github;
pub mod headers;
pub mod identity;
pub mod intake;

pub use auth::ProviderAuth;
pub use error::IntakeError;
pub use intake::{intake, IntakeOutcome, IntakeRequest, DEFAULT_MAX_BODY_BYTES};
