//! Group-membership authorization.

use tracing::debug;

use crate::identity::{IdentityBackend, Principal};
use crate::metrics::Metrics;

use super::error::AuthError;

/// Accept the principal iff it belongs to at least one allowed group.
///
/// Returns the non-empty intersection of the configured allow-list and the
/// principal's actual memberships. The rejection carries subject and
/// allow-list for audit logging only; none of it reaches the wire response.
pub async fn authorize(
    backend: &dyn IdentityBackend,
    http_client: &reqwest::Client,
    metrics: &Metrics,
    principal: &Principal,
    allowed_groups: &[String],
) -> Result<Vec<String>, AuthError> {
    let forbidden = || AuthError::Forbidden {
        subject_id: principal.subject_id.clone(),
        allowed_groups: allowed_groups.to_vec(),
    };

    // An empty allow-list can never be satisfied.
    if allowed_groups.is_empty() {
        return Err(forbidden());
    }

    let member_of = backend
        .filter_group_membership(http_client, principal, allowed_groups)
        .await
        .map_err(|e| {
            metrics.identity_errors_total.inc();
            AuthError::IdentityService(e)
        })?;

    let matched: Vec<String> = member_of
        .into_iter()
        .filter(|g| allowed_groups.contains(g))
        .collect();

    if matched.is_empty() {
        return Err(forbidden());
    }

    debug!(
        subject_id = %principal.subject_id,
        groups = ?matched,
        "principal authorized"
    );
    Ok(matched)
}
