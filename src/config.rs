use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::MatchPolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub identity: IdentityConfig,
    pub authorizer: AuthorizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ---------------------------------------------------------------------------
// Identity data-plane
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity data-plane API.
    pub endpoint: String,
    /// Name of the environment variable that holds the service-to-service
    /// bearer token for outbound identity calls. The token itself never
    /// lives in the config file.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    /// Per-call timeout (seconds) for identity API requests. A timeout is
    /// treated as an ordinary authentication/authorization failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_auth_token_env() -> String {
    "IDENTITY_AUTH_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Authorizer policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizerConfig {
    /// Comma-separated group ids permitted to reach the protected API.
    pub group_ids: String,
    /// Candidate HTTP methods tried when reconstructing `(request-target)`.
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    /// Which successful reconstruction wins when several validate.
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

impl AuthorizerConfig {
    /// Parse the configured allow-list: split on `,`, trim whitespace around
    /// each entry, drop empties. Parsed once at engine construction.
    pub fn allowed_groups(&self) -> Vec<String> {
        self.group_ids
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Candidate methods, lower-cased for `(request-target)` reconstruction.
    pub fn candidate_methods(&self) -> Vec<String> {
        self.methods
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect()
    }
}

fn default_methods() -> Vec<String> {
    // The REST verbs the protected API family supports.
    ["post", "get", "delete", "patch", "put"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:8080`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        !config.identity.endpoint.is_empty(),
        "identity.endpoint must not be empty"
    );
    anyhow::ensure!(
        config.identity.request_timeout_secs > 0,
        "identity.request_timeout_secs must be non-zero"
    );
    anyhow::ensure!(
        !config.authorizer.methods.is_empty(),
        "authorizer.methods must not be empty"
    );
    config
        .server
        .http_listen
        .parse::<SocketAddr>()
        .context("server.http_listen is not a valid socket address")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "identity:\n  endpoint: https://identity.internal\nauthorizer:\n  group_ids: \"g1,g2\"\n"
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.identity.auth_token_env, "IDENTITY_AUTH_TOKEN");
        assert_eq!(config.identity.request_timeout_secs, 10);
        assert_eq!(
            config.authorizer.methods,
            vec!["post", "get", "delete", "patch", "put"]
        );
        assert_eq!(config.authorizer.match_policy, MatchPolicy::First);
        assert_eq!(config.server.http_listen, "0.0.0.0:8080");
        validate_config(&config).unwrap();
    }

    #[test]
    fn match_policy_parses_from_yaml() {
        let yaml = "identity:\n  endpoint: https://identity.internal\nauthorizer:\n  group_ids: g1\n  match_policy: last\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.authorizer.match_policy, MatchPolicy::Last);
    }

    #[test]
    fn allowed_groups_trims_whitespace() {
        let authorizer = AuthorizerConfig {
            group_ids: "id1,  id2, id3,    id4   ".to_string(),
            methods: default_methods(),
            match_policy: MatchPolicy::First,
        };
        assert_eq!(
            authorizer.allowed_groups(),
            vec!["id1", "id2", "id3", "id4"]
        );
    }

    #[test]
    fn allowed_groups_drops_empty_entries() {
        let authorizer = AuthorizerConfig {
            group_ids: " , ,,".to_string(),
            methods: default_methods(),
            match_policy: MatchPolicy::First,
        };
        assert!(authorizer.allowed_groups().is_empty());
    }

    #[test]
    fn candidate_methods_are_lower_cased() {
        let authorizer = AuthorizerConfig {
            group_ids: "g1".to_string(),
            methods: vec!["POST".to_string(), "Get".to_string()],
            match_policy: MatchPolicy::First,
        };
        assert_eq!(authorizer.candidate_methods(), vec!["post", "get"]);
    }

    #[test]
    fn empty_method_list_is_rejected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.authorizer.methods.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.server.http_listen = "not-an-address".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config: Config = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.identity.request_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
