//! HTTP client for the identity data-plane API.
//!
//! Submits the signed-header subset to `/authentication/authenticateClient`
//! and membership queries to `/filterGroupMembership`. Outbound calls carry a
//! service-to-service bearer token read from the configured environment
//! variable on each call, so the token can rotate without a restart.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IdentityConfig;
use crate::engine::headers::HeaderBundle;

use super::{AuthenticateClientResult, IdentityBackend, Principal};

// ---------------------------------------------------------------------------
// Request/response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateClientDetails<'a> {
    request_headers: &'a HeaderBundle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterGroupMembershipDetails<'a> {
    principal: &'a Principal,
    group_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterGroupMembershipResult {
    #[serde(default)]
    group_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

pub struct DataplaneBackend {
    endpoint: String,
    auth_token_env: String,
    request_timeout: Duration,
}

impl DataplaneBackend {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token_env: config.auth_token_env.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn bearer_token(&self) -> String {
        std::env::var(&self.auth_token_env).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl IdentityBackend for DataplaneBackend {
    async fn authenticate_client(
        &self,
        http_client: &reqwest::Client,
        headers: &HeaderBundle,
    ) -> Result<AuthenticateClientResult> {
        let url = format!("{}/authentication/authenticateClient", self.endpoint);

        let resp = http_client
            .post(&url)
            .timeout(self.request_timeout)
            .bearer_auth(self.bearer_token())
            .header(header::ACCEPT, "application/json")
            .json(&AuthenticateClientDetails {
                request_headers: headers,
            })
            .send()
            .await
            .context("identity authenticateClient request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("identity authenticateClient returned {status}");
        }

        let result: AuthenticateClientResult = resp
            .json()
            .await
            .context("failed to parse authenticateClient response")?;

        debug!(
            resolved = result.principal.is_some(),
            "authenticateClient call completed"
        );
        Ok(result)
    }

    async fn filter_group_membership(
        &self,
        http_client: &reqwest::Client,
        principal: &Principal,
        group_ids: &[String],
    ) -> Result<Vec<String>> {
        let url = format!("{}/filterGroupMembership", self.endpoint);

        let resp = http_client
            .post(&url)
            .timeout(self.request_timeout)
            .bearer_auth(self.bearer_token())
            .header(header::ACCEPT, "application/json")
            .json(&FilterGroupMembershipDetails {
                principal,
                group_ids,
            })
            .send()
            .await
            .context("identity filterGroupMembership request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("identity filterGroupMembership returned {status}");
        }

        let result: FilterGroupMembershipResult = resp
            .json()
            .await
            .context("failed to parse filterGroupMembership response")?;

        debug!(
            subject_id = %principal.subject_id,
            matched = result.group_ids.len(),
            "filterGroupMembership call completed"
        );
        Ok(result.group_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_result_with_principal_deserializes() {
        let body = serde_json::json!({
            "principal": {
                "subjectId": "ocid1.user.oc1..alice",
                "tenantId": "ocid1.tenancy.oc1..acme",
                "claims": [{"key": "pstype", "value": "user", "issuer": "authService"}],
            },
            "errorMessage": null,
        });

        let result: AuthenticateClientResult = serde_json::from_value(body).unwrap();
        let principal = result.principal.unwrap();
        assert_eq!(principal.subject_id, "ocid1.user.oc1..alice");
        assert_eq!(principal.tenant_id.as_deref(), Some("ocid1.tenancy.oc1..acme"));
        assert_eq!(principal.claims.len(), 1);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn authenticate_result_without_principal_deserializes() {
        let body = serde_json::json!({
            "principal": null,
            "errorMessage": "signature validation failed",
        });

        let result: AuthenticateClientResult = serde_json::from_value(body).unwrap();
        assert!(result.principal.is_none());
        assert_eq!(
            result.error_message.as_deref(),
            Some("signature validation failed")
        );
    }

    #[test]
    fn authenticate_details_serializes_request_headers_key() {
        let mut headers = HeaderBundle::new();
        headers.insert("date".to_string(), vec!["today".to_string()]);

        let body = serde_json::to_value(AuthenticateClientDetails {
            request_headers: &headers,
        })
        .unwrap();

        assert_eq!(body["requestHeaders"]["date"][0], "today");
    }

    #[test]
    fn membership_details_serializes_group_ids_key() {
        let principal = Principal {
            subject_id: "ocid1.user.oc1..alice".to_string(),
            tenant_id: None,
            claims: Vec::new(),
        };
        let groups = vec!["g1".to_string(), "g2".to_string()];

        let body = serde_json::to_value(FilterGroupMembershipDetails {
            principal: &principal,
            group_ids: &groups,
        })
        .unwrap();

        assert_eq!(body["principal"]["subjectId"], "ocid1.user.oc1..alice");
        assert_eq!(body["groupIds"], serde_json::json!(["g1", "g2"]));
    }

    #[test]
    fn membership_result_defaults_to_empty_groups() {
        let result: FilterGroupMembershipResult = serde_json::from_str("{}").unwrap();
        assert!(result.group_ids.is_empty());
    }
}
