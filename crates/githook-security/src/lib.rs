pub mod cache;
pub mod tenant;

pub use cache::TenantCache;
pub use tenant::{tenant_from_headers, RequestTenant};
