//! Cluster connection management.
//!
//! [`ClusterConnector`] resolves a [`ConnectionDescriptor`] into a
//! [`SessionHandle`]: it materializes the credential into a client
//! configuration in memory, applies the descriptor's TLS policy and namespace
//! impersonation, and probes the server version before handing out a session.

use std::fmt;

use base64::Engine;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use podgate_core::{ConnectionDescriptor, Credential, TlsPolicy};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::Operation;
use crate::types::ClusterInfo;
use crate::{GatewayError, Result};

/// User entry name used for bearer-token configurations.
const TOKEN_USER: &str = "podgate";

/// The default service account identity of a namespace.
#[must_use]
pub fn service_account_identity(namespace: &str) -> String {
    format!("system:serviceaccount:{namespace}:default")
}

/// Turns connection descriptors into live sessions.
///
/// Every call to [`connect`](Self::connect) performs the full handshake;
/// nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct ClusterConnector {
    config: GatewayConfig,
}

impl ClusterConnector {
    /// Create a connector with the given gateway configuration.
    #[must_use]
    pub const fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the gateway config.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Establish an authenticated session against the descriptor's cluster.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` or `InvalidCredentialFormat` if no client
    /// can be built, and `ClusterUnreachable` if the version probe fails. No
    /// session is returned in either case.
    pub async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<SessionHandle> {
        descriptor.validate()?;

        let id = Uuid::new_v4();
        let namespace = descriptor
            .effective_namespace(&self.config.default_namespace)
            .to_string();

        debug!(
            session = %id,
            cluster = %descriptor.name,
            credential = %descriptor.credential.kind(),
            "Building client configuration"
        );

        let client_config = self.client_config(descriptor).await?;
        let client = Client::try_from(client_config).map_err(|e| {
            GatewayError::InvalidCredentialFormat {
                cluster: descriptor.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let info = probe(&client, &descriptor.name, &namespace).await?;

        info!(
            session = %id,
            cluster = %descriptor.name,
            namespace = %namespace,
            version = %info.version,
            platform = %info.platform,
            "Connected to cluster"
        );

        Ok(SessionHandle {
            id,
            client,
            info,
        })
    }

    /// Connect and immediately discard the session, returning what the probe
    /// learned.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect).
    pub async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> Result<ClusterInfo> {
        let session = self.connect(descriptor).await?;
        Ok(session.info)
    }

    /// Build the client configuration for a descriptor without contacting the
    /// cluster.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentialFormat` if the credential cannot be parsed or
    /// materialized.
    pub async fn client_config(&self, descriptor: &ConnectionDescriptor) -> Result<Config> {
        let invalid = |reason: String| GatewayError::InvalidCredentialFormat {
            cluster: descriptor.name.clone(),
            reason,
        };

        let mut kubeconfig = match &descriptor.credential {
            Credential::StructuredConfig(document) => parse_kubeconfig(document).map_err(invalid)?,
            Credential::BearerToken(token) => token_kubeconfig(descriptor, token)
                .map_err(|e| invalid(e.to_string()))?,
        };
        apply_tls_policy(&mut kubeconfig, &descriptor.tls);

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| invalid(e.to_string()))?;

        config.connect_timeout = Some(self.config.connect_timeout());
        config.read_timeout = Some(self.config.read_timeout());
        config.accept_invalid_certs = descriptor.tls.skips_verification();
        if config.accept_invalid_certs {
            warn!(
                cluster = %descriptor.name,
                "TLS certificate verification disabled for cluster"
            );
        }

        let namespace = descriptor.effective_namespace(&self.config.default_namespace);
        config.default_namespace = namespace.to_string();

        if let Some(scope) = descriptor.namespace_scope() {
            if self.config.impersonate_namespace_identity {
                config.auth_info.impersonate = Some(service_account_identity(scope));
            }
        }

        Ok(config)
    }
}

/// Parse a structured configuration document in either JSON or YAML form.
fn parse_kubeconfig(document: &str) -> std::result::Result<Kubeconfig, String> {
    if document.trim_start().starts_with('{') {
        serde_json::from_str(document).map_err(|e| e.to_string())
    } else {
        Kubeconfig::from_yaml(document).map_err(|e| e.to_string())
    }
}

/// Wrap a bearer token into a single-context configuration document.
fn token_kubeconfig(
    descriptor: &ConnectionDescriptor,
    token: &str,
) -> serde_json::Result<Kubeconfig> {
    let cluster = descriptor.name.as_str();
    let mut context = serde_json::json!({
        "cluster": cluster,
        "user": TOKEN_USER,
    });
    if let Some(ns) = descriptor.namespace_scope() {
        context["namespace"] = serde_json::Value::from(ns);
    }

    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": cluster, "cluster": { "server": descriptor.endpoint } }],
        "users": [{ "name": TOKEN_USER, "user": { "token": token } }],
        "contexts": [{ "name": cluster, "context": context }],
        "current-context": cluster,
    }))
}

/// Make the descriptor's TLS policy authoritative for every cluster entry.
fn apply_tls_policy(kubeconfig: &mut Kubeconfig, policy: &TlsPolicy) {
    for cluster in kubeconfig
        .clusters
        .iter_mut()
        .filter_map(|named| named.cluster.as_mut())
    {
        match policy {
            TlsPolicy::Verify => {
                cluster.insecure_skip_tls_verify = Some(false);
            }
            TlsPolicy::CustomCa(pem) => {
                cluster.insecure_skip_tls_verify = Some(false);
                cluster.certificate_authority = None;
                cluster.certificate_authority_data =
                    Some(base64::engine::general_purpose::STANDARD.encode(pem.as_bytes()));
            }
            TlsPolicy::InsecureSkipVerify => {
                cluster.insecure_skip_tls_verify = Some(true);
            }
        }
    }
}

async fn probe(client: &Client, cluster: &str, namespace: &str) -> Result<ClusterInfo> {
    let version = client
        .apiserver_version()
        .await
        .map_err(|e| GatewayError::ClusterUnreachable {
            cluster: cluster.to_string(),
            message: e.to_string(),
        })?;

    Ok(ClusterInfo {
        cluster: cluster.to_string(),
        version: version.git_version,
        platform: version.platform,
        namespace: namespace.to_string(),
    })
}

/// An authenticated session against one cluster.
///
/// A session belongs to one operation chain. The underlying client is cheap
/// to clone, but callers running concurrent chains should connect separately.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    client: Client,
    info: ClusterInfo,
}

impl SessionHandle {
    /// Random identifier of this session, for log correlation.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Cluster label from the descriptor.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.info.cluster
    }

    /// Effective namespace of the session.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.info.namespace
    }

    /// What the connect-time probe learned.
    #[must_use]
    pub const fn info(&self) -> &ClusterInfo {
        &self.info
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Get the pods API for a namespace.
    #[must_use]
    pub fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Re-probe the server version and check that the session's namespace
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns `ClusterUnreachable` if the version probe fails and
    /// `WorkloadOperationFailed` if the namespace cannot be read.
    pub async fn health_check(&self) -> Result<ClusterInfo> {
        let info = probe(&self.client, self.cluster(), self.namespace()).await?;

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.get(self.namespace()).await.map_err(|e| {
            GatewayError::operation(Operation::HealthCheck, self.namespace(), None, &e)
        })?;

        debug!(
            session = %self.id,
            cluster = %self.cluster(),
            version = %info.version,
            "Health check passed"
        );
        Ok(info)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
