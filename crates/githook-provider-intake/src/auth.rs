use githook_core::{Error as CoreError, HeaderMultimap, Provider};
use githook_crypto::{constant_time_eq, verify_prefixed_signature};

use crate::error::Result;

/// The pre-resolved secret material for one provider instance. Resolving
/// `ProviderInstanceRecord.config_json` into one of these is the caller's
/// job (spec §3 leaves `config_json` untyped); this crate only ever sees
/// the material it needs to verify a single request.
pub enum ProviderAuth<'a> {
    /// GitHub/Bitbucket: HMAC-{SHA256,SHA1} of the raw body.
    Hmac { secret: &'a [u8] },
    /// GitLab: a static per-project/instance token compared byte-for-byte.
    Token { token: &'a str },
}

/// Verify `body` against `auth` per spec §4.6: GitHub accepts
/// `X-Hub-Signature-256` or legacy `X-Hub-Signature`; GitLab compares
/// `X-Gitlab-Token` in constant time; Bitbucket (Cloud and Server both
/// support configuring an HMAC secret) is verified the same way as GitHub
/// via `X-Hub-Signature`.
pub fn verify_signature(
    provider: Provider,
    headers: &HeaderMultimap,
    body: &[u8],
    auth: &ProviderAuth<'_>,
) -> Result<()> {
    match (provider, auth) {
        (Provider::Github, ProviderAuth::Hmac { secret }) => {
            let header = headers
                .get_first("X-Hub-Signature-256")
                .or_else(|| headers.get_first("X-Hub-Signature"))
                .ok_or(CoreError::SignatureMismatch)?;
            verify_prefixed_signature(header, secret, body)?;
            Ok(())
        }
        (Provider::Bitbucket, ProviderAuth::Hmac { secret }) => {
            let header = headers
                .get_first("X-Hub-Signature")
                .ok_or(CoreError::SignatureMismatch)?;
            verify_prefixed_signature(header, secret, body)?;
            Ok(())
        }
        (Provider::Gitlab, ProviderAuth::Token { token }) => {
            let header = headers
                .get_first("X-Gitlab-Token")
                .ok_or(CoreError::SignatureMismatch)?;
            if !constant_time_eq(header, token) {
                return Err(CoreError::SignatureMismatch.into());
            }
            Ok(())
        }
        _ => Err(CoreError::FailedPrecondition(
            "provider/auth material mismatch".into(),
        )
        .into()),
    }
}
