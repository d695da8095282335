use githook_core::Provider;

/// Header carrying the provider's event-type name (spec §4.6 "extract event
/// name from provider-specific header").
pub fn event_header(provider: Provider) -> &'static str {
    match provider {
        Provider::Github => "X-GitHub-Event",
        Provider::Gitlab => "X-Gitlab-Event",
        Provider::Bitbucket => "X-Event-Key",
    }
}

/// Header carrying the provider's per-delivery idempotency id, used as
/// `request_id` when present.
pub fn delivery_header(provider: Provider) -> &'static str {
    match provider {
        Provider::Github => "X-GitHub-Delivery",
        Provider::Gitlab => "X-Gitlab-Event-UUID",
        Provider::Bitbucket => "X-Request-UUID",
    }
}
