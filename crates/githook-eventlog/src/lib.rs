pub mod query;
pub mod replay;

pub use query::{breakdown_page, list_page, Page};
pub use replay::{replay_event_log, ReplayOutcome};
