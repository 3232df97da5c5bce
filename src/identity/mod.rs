//! Identity data-plane abstraction layer.
//!
//! Provides the [`IdentityBackend`] trait that encapsulates the two identity
//! service operations the authorizer consumes: signature validation
//! (`authenticateClient`) and group-membership filtering
//! (`filterGroupMembership`). The engine dispatches through this trait so
//! that no wire-format detail leaks outside this module.

pub mod dataplane;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::headers::HeaderBundle;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Identity resolved from a valid request signature.
///
/// Owned by the identity service; the engine only reads `subject_id` and
/// echoes the rest back on the membership call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<Claim>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// Outcome of an `authenticateClient` call. A missing principal means the
/// signature did not validate; `error_message` says why.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateClientResult {
    #[serde(default)]
    pub principal: Option<Principal>,
    #[serde(default)]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the identity data-plane API.
#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Cryptographically verify the signature carried by `headers` and
    /// resolve the signing identity.
    async fn authenticate_client(
        &self,
        http_client: &reqwest::Client,
        headers: &HeaderBundle,
    ) -> Result<AuthenticateClientResult>;

    /// Return the subset of `group_ids` the principal actually belongs to.
    async fn filter_group_membership(
        &self,
        http_client: &reqwest::Client,
        principal: &Principal,
        group_ids: &[String],
    ) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the identity backend for the configured data-plane endpoint.
pub fn build_backend(config: &Config) -> Box<dyn IdentityBackend> {
    Box::new(dataplane::DataplaneBackend::new(&config.identity))
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
