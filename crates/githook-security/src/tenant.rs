use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use githook_core::DEFAULT_TENANT;
use githook_http_errors::ApiError;

/// The tenant id carried on every admin-RPC request (spec §6): header
/// `X-Tenant-ID`, aliased as `X-Githooks-Tenant-ID`. Absent or blank is
/// treated as `"default"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTenant(pub String);

pub fn tenant_from_headers(headers: &HeaderMap) -> String {
    let raw = headers
        .get("X-Tenant-ID")
        .or_else(|| headers.get("X-Githooks-Tenant-ID"))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    raw.unwrap_or(DEFAULT_TENANT).to_string()
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestTenant(tenant_from_headers(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_defaults_to_default_tenant() {
        let headers = HeaderMap::new();
        assert_eq!(tenant_from_headers(&headers), "default");
    }

    #[test]
    fn blank_header_defaults_to_default_tenant() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Tenant-ID", HeaderValue::from_static("   "));
        assert_eq!(tenant_from_headers(&headers), "default");
    }

    #[test]
    fn alias_header_is_honored_when_primary_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Githooks-Tenant-ID", HeaderValue::from_static("acme"));
        assert_eq!(tenant_from_headers(&headers), "acme");
    }

    #[test]
    fn primary_header_wins_over_alias() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Tenant-ID", HeaderValue::from_static("acme"));
        headers.insert("X-Githooks-Tenant-ID", HeaderValue::from_static("other"));
        assert_eq!(tenant_from_headers(&headers), "acme");
    }
}
