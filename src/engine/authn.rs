//! Signature authentication via candidate-method reconstruction.
//!
//! The gateway normalizes the real HTTP verb away before the payload reaches
//! us, so the signed `(request-target)` value cannot be rebuilt directly.
//! Instead the path is treated as fixed and every method the protected API
//! supports is tried in turn; only the reconstruction matching the verb the
//! caller actually signed will validate.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::identity::{IdentityBackend, Principal};
use crate::metrics::Metrics;

use super::error::AuthError;
use super::headers::{HeaderBundle, REQUEST_TARGET};

/// Which successful reconstruction wins when more than one candidate method
/// validates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Stop at the first candidate method that authenticates.
    #[default]
    First,
    /// Try every candidate and keep the last success.
    Last,
}

/// Resolve a principal by trying each candidate method against the original
/// request path.
///
/// Per-method rejections and transport faults are expected for every method
/// except the one the caller signed; both count as an ordinary
/// authentication failure so the caller never learns which stage (or which
/// backend condition) rejected it.
pub async fn authenticate(
    backend: &dyn IdentityBackend,
    http_client: &reqwest::Client,
    metrics: &Metrics,
    headers: &HeaderBundle,
    methods: &[String],
    policy: MatchPolicy,
) -> Result<Principal, AuthError> {
    // Without the original path there is nothing to reconstruct.
    let path = headers
        .get(REQUEST_TARGET)
        .and_then(|values| values.first())
        .cloned()
        .ok_or(AuthError::NotAuthenticated)?;

    let mut attempt = headers.clone();
    let mut resolved: Option<Principal> = None;

    for method in methods {
        attempt.insert(
            REQUEST_TARGET.to_string(),
            vec![format!("{method} {path}")],
        );
        metrics.authn_attempts_total.inc();

        match backend.authenticate_client(http_client, &attempt).await {
            Ok(result) => match result.principal {
                Some(principal) => {
                    debug!(
                        %method,
                        subject_id = %principal.subject_id,
                        "candidate method authenticated"
                    );
                    resolved = Some(principal);
                    if policy == MatchPolicy::First {
                        break;
                    }
                }
                None => {
                    debug!(
                        %method,
                        reason = result.error_message.as_deref().unwrap_or("unknown"),
                        "candidate method rejected"
                    );
                }
            },
            Err(e) => {
                metrics.identity_errors_total.inc();
                warn!(%method, error = %e, "identity service call failed");
            }
        }
    }

    resolved.ok_or(AuthError::NotAuthenticated)
}
