use serde_json::Value;

/// Numeric or string JSON id, normalized to a plain string for use as a
/// storage key.
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// The identity tuple an intake handler resolves from a payload before an
/// `InstallationStore` lookup: the provider's installation/app-binding id,
/// the owning account id, and a best-effort human-readable account name
/// (spec §4.6 step iv).
pub struct PayloadIdentity {
    pub installation_id: String,
    pub account_id: String,
    pub account_name: Option<String>,
}

/// GitHub Apps carry `installation.id` and `installation.account` on every
/// delivery once the App is installed.
pub fn github_identity(payload: &Value) -> Option<PayloadIdentity> {
    let installation = payload.get("installation")?;
    let installation_id = json_id(installation.get("id")?)?;
    let account = installation.get("account")?;
    let account_id = json_id(account.get("id")?)?;
    let account_name = account.get("login").and_then(Value::as_str).map(str::to_string);
    Some(PayloadIdentity {
        installation_id,
        account_id,
        account_name,
    })
}

pub fn github_repo_id(payload: &Value) -> Option<String> {
    json_id(payload.pointer("/repository/id")?)
}

/// GitLab has no App-style installation concept; this crate treats the
/// integration's target project as the installation binding and its
/// namespace as the account, which is the closest GitLab analogue to a
/// GitHub App install (documented as an open-question decision).
pub fn gitlab_identity(payload: &Value) -> Option<PayloadIdentity> {
    let project = payload.get("project")?;
    let installation_id = json_id(project.get("id")?)?;
    let namespace = project.get("namespace").and_then(Value::as_str);
    let account_id = namespace
        .map(str::to_string)
        .or_else(|| json_id(payload.get("user_id")?))?;
    let account_name = payload
        .pointer("/user/username")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(PayloadIdentity {
        installation_id,
        account_id,
        account_name,
    })
}

pub fn gitlab_repo_id(payload: &Value) -> Option<String> {
    json_id(payload.pointer("/project/id")?)
}

/// Bitbucket has no App-style installation concept either; the repository's
/// workspace is the closest analogue to an account, and the repository
/// itself stands in for the installation binding.
pub fn bitbucket_identity(payload: &Value) -> Option<PayloadIdentity> {
    let repository = payload.get("repository")?;
    let installation_id = repository
        .get("uuid")
        .and_then(Value::as_str)
        .map(str::to_string)?;
    let account_id = repository
        .pointer("/workspace/uuid")
        .and_then(Value::as_str)
        .map(str::to_string)?;
    let account_name = repository
        .pointer("/workspace/slug")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(PayloadIdentity {
        installation_id,
        account_id,
        account_name,
    })
}

pub fn bitbucket_repo_id(payload: &Value) -> Option<String> {
    payload
        .pointer("/repository/uuid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_github_installation_identity() {
        let payload: Value = serde_json::from_str(
            r#"{"installation":{"id":42,"account":{"id":7,"login":"acme-org"}}}"#,
        )
        .unwrap();
        let identity = github_identity(&payload).unwrap();
        assert_eq!(identity.installation_id, "42");
        assert_eq!(identity.account_id, "7");
        assert_eq!(identity.account_name.as_deref(), Some("acme-org"));
    }

    #[test]
    fn missing_installation_yields_none() {
        let payload: Value = serde_json::from_str(r#"{"action":"opened"}"#).unwrap();
        assert!(github_identity(&payload).is_none());
    }
}
