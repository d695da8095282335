pub mod ctx;
pub mod driver;
pub mod error;
pub mod event;
pub mod event_log;
pub mod install;
pub mod namespace;
pub mod provider_instance;
pub mod rule;
pub mod storage;

pub use ctx::{normalize_tenant, Ctx, DEFAULT_TENANT, GLOBAL_TENANT};
pub use driver::{DriverName, DriverRecord};
pub use error::{Error, Result};
pub use event::{Event, FlatValue, HeaderMultimap};
pub use event_log::{
    AnalyticsSummary, BreakdownQuery, BreakdownRow, BreakdownSort, EventLogFilter,
    EventLogRecord, EventLogStatus, GroupBy, PageToken, TimeInterval, TimeseriesPoint,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use install::InstallRecord;
pub use namespace::{NamespaceFilter, NamespaceRecord};
pub use provider_instance::{Provider, ProviderInstanceRecord};
pub use rule::{MatchedRule, Rule};
pub use storage::{
    DriverStore, EventLogStore, InstallationStore, NamespaceStore, ProviderInstanceStore,
    RuleStore,
};
