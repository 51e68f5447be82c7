//! Connection descriptors.
//!
//! A [`ConnectionDescriptor`] says how to reach one cluster. It is produced by
//! the surrounding service from stored platform configuration and consumed,
//! once, by the gateway's connection manager.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::names::validate_label;

/// Describes how to reach and authenticate against one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Opaque cluster label, used in logs and errors.
    pub name: String,
    /// Base URL of the orchestrator API.
    pub endpoint: String,
    /// Credential material.
    pub credential: Credential,
    /// Namespace scope for operations. Empty is treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    /// TLS verification policy. There is deliberately no default.
    pub tls: TlsPolicy,
}

/// Credential material for a cluster.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Credential {
    /// A serialized client configuration document (YAML or JSON kubeconfig).
    StructuredConfig(String),
    /// A bearer token presented to `endpoint`.
    BearerToken(String),
}

/// The kind of a [`Credential`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    /// See [`Credential::StructuredConfig`].
    StructuredConfig,
    /// See [`Credential::BearerToken`].
    BearerToken,
}

impl Credential {
    /// The kind of this credential.
    #[must_use]
    pub const fn kind(&self) -> CredentialKind {
        match self {
            Self::StructuredConfig(_) => CredentialKind::StructuredConfig,
            Self::BearerToken(_) => CredentialKind::BearerToken,
        }
    }

    /// The raw credential payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::StructuredConfig(p) | Self::BearerToken(p) => p,
        }
    }
}

// Payloads are secrets and must never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind())
            .field("payload", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuredConfig => f.write_str("structured-config"),
            Self::BearerToken => f.write_str("bearer-token"),
        }
    }
}

/// How the server certificate of the cluster is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "ca", rename_all = "kebab-case")]
pub enum TlsPolicy {
    /// Verify against the system roots, or the CA embedded in a structured config.
    Verify,
    /// Verify against the given PEM-encoded CA bundle.
    CustomCa(String),
    /// Skip certificate verification entirely.
    InsecureSkipVerify,
}

impl TlsPolicy {
    /// Whether certificate verification is disabled.
    #[must_use]
    pub const fn skips_verification(&self) -> bool {
        matches!(self, Self::InsecureSkipVerify)
    }
}

impl ConnectionDescriptor {
    /// The namespace scope requested by the caller, if any.
    #[must_use]
    pub fn namespace_scope(&self) -> Option<&str> {
        self.target_namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// The namespace operations default to.
    #[must_use]
    pub fn effective_namespace<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace_scope().unwrap_or(default)
    }

    /// Check the descriptor's invariants.
    ///
    /// Structured configuration payloads are only checked for presence here;
    /// parsing them is the connection manager's job.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is empty, the endpoint of a
    /// bearer-token descriptor is not an http(s) URL, or the target namespace
    /// is not a legal name.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Missing("cluster name"));
        }
        if self.credential.payload().trim().is_empty() {
            return Err(CoreError::Missing("credential payload"));
        }
        if let Credential::BearerToken(_) = self.credential {
            validate_endpoint(&self.endpoint)?;
        }
        if let TlsPolicy::CustomCa(pem) = &self.tls {
            if pem.trim().is_empty() {
                return Err(CoreError::Missing("custom CA bundle"));
            }
        }
        if let Some(ns) = self.namespace_scope() {
            validate_label(ns).map_err(|source| CoreError::InvalidName {
                field: "target namespace",
                value: ns.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| CoreError::InvalidEndpoint(endpoint.to_string()))?;

    let host = rest.split(['/', '?']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(CoreError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            name: "staging".to_string(),
            endpoint: "https://10.0.0.1:6443".to_string(),
            credential: Credential::BearerToken("token".to_string()),
            target_namespace: None,
            tls: TlsPolicy::Verify,
        }
    }

    #[test]
    fn valid_token_descriptor() {
        assert!(token_descriptor().validate().is_ok());
    }

    #[test]
    fn namespace_defaults_when_absent_or_empty() {
        let mut d = token_descriptor();
        assert_eq!(d.effective_namespace("default"), "default");

        d.target_namespace = Some(String::new());
        assert_eq!(d.namespace_scope(), None);
        assert_eq!(d.effective_namespace("default"), "default");

        d.target_namespace = Some("team-a".to_string());
        assert_eq!(d.effective_namespace("default"), "team-a");
    }

    #[test]
    fn rejects_illegal_namespace() {
        let mut d = token_descriptor();
        d.target_namespace = Some("Team_A".to_string());
        assert!(matches!(
            d.validate(),
            Err(CoreError::InvalidName {
                field: "target namespace",
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_endpoint_for_token() {
        let mut d = token_descriptor();
        d.endpoint = "10.0.0.1:6443".to_string();
        assert!(matches!(d.validate(), Err(CoreError::InvalidEndpoint(_))));

        d.endpoint = "https://".to_string();
        assert!(matches!(d.validate(), Err(CoreError::InvalidEndpoint(_))));
    }

    #[test]
    fn structured_config_ignores_endpoint() {
        let mut d = token_descriptor();
        d.endpoint = String::new();
        d.credential = Credential::StructuredConfig("apiVersion: v1".to_string());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn rejects_empty_payload() {
        let mut d = token_descriptor();
        d.credential = Credential::BearerToken("  ".to_string());
        assert!(matches!(
            d.validate(),
            Err(CoreError::Missing("credential payload"))
        ));
    }

    #[test]
    fn credential_serde_format() {
        let json = r#"{
            "name": "prod",
            "endpoint": "https://k8s.example.com",
            "credential": {"kind": "bearer-token", "payload": "abc"},
            "target_namespace": "apps",
            "tls": {"mode": "insecure-skip-verify"}
        }"#;
        let d: ConnectionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.credential.kind(), CredentialKind::BearerToken);
        assert_eq!(d.credential.payload(), "abc");
        assert!(d.tls.skips_verification());

        let ca = r#"{"mode": "custom-ca", "ca": "-----BEGIN CERTIFICATE-----"}"#;
        let tls: TlsPolicy = serde_json::from_str(ca).unwrap();
        assert!(matches!(tls, TlsPolicy::CustomCa(_)));
    }

    #[test]
    fn tls_policy_is_mandatory() {
        let json = r#"{
            "name": "prod",
            "endpoint": "https://k8s.example.com",
            "credential": {"kind": "bearer-token", "payload": "abc"}
        }"#;
        assert!(serde_json::from_str::<ConnectionDescriptor>(json).is_err());
    }

    #[test]
    fn debug_redacts_payload() {
        let cred = Credential::BearerToken("super-secret".to_string());
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("BearerToken"));
    }
}
