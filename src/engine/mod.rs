//! Request authentication/authorization engine.
//!
//! Drives the three-stage decision pipeline for each inbound request: header
//! extraction, signature authentication against the identity data-plane, and
//! group-membership authorization. Any stage failure short-circuits to a
//! deny verdict. Diagnostic detail stays in server-side logs; the wire
//! response is identical for every failure so an unauthenticated caller
//! cannot probe which stage rejected it.

pub mod authn;
pub mod authz;
pub mod error;
pub mod headers;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::identity::IdentityBackend;
use crate::metrics::Metrics;

pub use authn::MatchPolicy;
pub use error::AuthError;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Terminal decision for one inbound request; constructed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed { subject_id: String },
    Denied,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Orchestrates extract -> authenticate -> authorize.
///
/// Process-wide singleton: holds only immutable configuration and the shared
/// identity client, so concurrent decisions need no locking.
pub struct Engine {
    identity: Arc<dyn IdentityBackend>,
    http_client: reqwest::Client,
    metrics: Arc<Metrics>,
    methods: Vec<String>,
    match_policy: MatchPolicy,
    allowed_groups: Vec<String>,
}

impl Engine {
    pub fn new(
        config: &Config,
        identity: Arc<dyn IdentityBackend>,
        http_client: reqwest::Client,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            identity,
            http_client,
            metrics,
            methods: config.authorizer.candidate_methods(),
            match_policy: config.authorizer.match_policy,
            allowed_groups: config.authorizer.allowed_groups(),
        }
    }

    /// Decide whether the request described by the gateway payload may reach
    /// the protected API.
    pub async fn decide(&self, payload: &[u8]) -> Verdict {
        match self.try_decide(payload).await {
            Ok(verdict) => verdict,
            Err(e) => {
                match e {
                    AuthError::Forbidden { .. } | AuthError::IdentityService(_) => {
                        error!(error = %e, "request denied")
                    }
                    _ => warn!(error = %e, "request denied"),
                }
                Verdict::Denied
            }
        }
    }

    async fn try_decide(&self, payload: &[u8]) -> Result<Verdict, AuthError> {
        let headers = headers::extract_and_validate(payload)?;

        let principal = authn::authenticate(
            self.identity.as_ref(),
            &self.http_client,
            &self.metrics,
            &headers,
            &self.methods,
            self.match_policy,
        )
        .await?;

        authz::authorize(
            self.identity.as_ref(),
            &self.http_client,
            &self.metrics,
            &principal,
            &self.allowed_groups,
        )
        .await?;

        info!(subject_id = %principal.subject_id, "request allowed");
        Ok(Verdict::Allowed {
            subject_id: principal.subject_id,
        })
    }
}
