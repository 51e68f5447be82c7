//! Error types for the gateway crate.
//!
//! Every failure the gateway reports carries an explicit [`ErrorKind`] so that
//! callers can branch on the kind instead of inspecting messages. Orchestrator
//! errors are wrapped with the verb and target they occurred on; their
//! messages are passed through unchanged.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// A lifecycle verb, used to give errors operation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Listing workloads.
    List,
    /// Reading one workload.
    Get,
    /// Starting a workload.
    Start,
    /// Stopping a workload.
    Stop,
    /// Restarting a workload.
    Restart,
    /// Deleting a workload.
    Delete,
    /// Reading container logs.
    Logs,
    /// Polling for readiness.
    AwaitReady,
    /// Checking session health.
    HealthCheck,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Delete => "delete",
            Self::Logs => "logs",
            Self::AwaitReady => "await-ready",
            Self::HealthCheck => "health-check",
        };
        f.write_str(verb)
    }
}

/// The kind of a [`GatewayError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The descriptor violates its invariants.
    InvalidDescriptor,
    /// The credential payload cannot be parsed or materialized.
    InvalidCredentialFormat,
    /// The liveness probe failed.
    ClusterUnreachable,
    /// A resource quantity in a creation request is malformed.
    InvalidResourceSpecification,
    /// A command line in a creation request is malformed.
    InvalidCommand,
    /// The orchestrator rejected a create call.
    WorkloadCreationFailed,
    /// A list, get, delete or log call failed.
    WorkloadOperationFailed,
    /// A readiness wait ran out of time.
    ReadinessTimeout,
    /// A readiness wait was cancelled by the caller.
    Cancelled,
    /// A lifecycle verb was used before a successful connect.
    ClientNotInitialized,
}

/// Errors that can occur during gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The connection descriptor is invalid.
    #[error("invalid connection descriptor: {0}")]
    InvalidDescriptor(#[from] podgate_core::CoreError),

    /// The credential payload cannot be turned into a client configuration.
    #[error("invalid credential format for cluster '{cluster}': {reason}")]
    InvalidCredentialFormat {
        /// Cluster label from the descriptor.
        cluster: String,
        /// Parser or client-builder message.
        reason: String,
    },

    /// The server-version probe failed.
    #[error("cluster '{cluster}' unreachable: {message}")]
    ClusterUnreachable {
        /// Cluster label from the descriptor.
        cluster: String,
        /// Underlying client error message.
        message: String,
    },

    /// A `cpu:` or `memory:` value is not a valid quantity.
    #[error("invalid resource specification '{token}': {reason}")]
    InvalidResourceSpecification {
        /// The offending token.
        token: String,
        /// Why the quantity was rejected.
        reason: String,
    },

    /// The command text could not be split into arguments.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The orchestrator rejected the create call, or the request was rejected
    /// before being sent.
    #[error("failed to create workload {namespace}/{name}: {message}")]
    WorkloadCreationFailed {
        /// Target namespace.
        namespace: String,
        /// Requested workload name.
        name: String,
        /// Orchestrator message.
        message: String,
        /// Orchestrator status code, when the API answered.
        code: Option<u16>,
    },

    /// A non-create orchestrator call failed.
    #[error("{operation} failed for {target}: {message}")]
    WorkloadOperationFailed {
        /// The verb that failed.
        operation: Operation,
        /// `namespace` or `namespace/workload`.
        target: String,
        /// Orchestrator message.
        message: String,
        /// Orchestrator status code, when the API answered.
        code: Option<u16>,
    },

    /// The workload did not become ready in time.
    #[error("workload {namespace}/{workload} not ready after {timeout:?}")]
    ReadinessTimeout {
        /// Namespace polled.
        namespace: String,
        /// Workload polled.
        workload: String,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// The readiness wait was cancelled.
    #[error("wait for workload {namespace}/{workload} cancelled")]
    Cancelled {
        /// Namespace polled.
        namespace: String,
        /// Workload polled.
        workload: String,
    },

    /// No session has been established.
    #[error("kubernetes client not initialized")]
    ClientNotInitialized,
}

impl GatewayError {
    /// Wrap an orchestrator error from a non-create call.
    #[must_use]
    pub fn operation(
        operation: Operation,
        namespace: &str,
        workload: Option<&str>,
        err: &kube::Error,
    ) -> Self {
        Self::WorkloadOperationFailed {
            operation,
            target: target(namespace, workload),
            message: orchestrator_message(err),
            code: orchestrator_code(err),
        }
    }

    /// Wrap an orchestrator error from a create call.
    #[must_use]
    pub fn creation(namespace: &str, name: &str, err: &kube::Error) -> Self {
        Self::WorkloadCreationFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: orchestrator_message(err),
            code: orchestrator_code(err),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDescriptor(_) => ErrorKind::InvalidDescriptor,
            Self::InvalidCredentialFormat { .. } => ErrorKind::InvalidCredentialFormat,
            Self::ClusterUnreachable { .. } => ErrorKind::ClusterUnreachable,
            Self::InvalidResourceSpecification { .. } => ErrorKind::InvalidResourceSpecification,
            Self::InvalidCommand(_) => ErrorKind::InvalidCommand,
            Self::WorkloadCreationFailed { .. } => ErrorKind::WorkloadCreationFailed,
            Self::WorkloadOperationFailed { .. } => ErrorKind::WorkloadOperationFailed,
            Self::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::ClientNotInitialized => ErrorKind::ClientNotInitialized,
        }
    }

    /// Whether a caller may reasonably retry. The gateway never retries itself.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ClusterUnreachable { .. } | Self::ReadinessTimeout { .. } => true,
            Self::WorkloadOperationFailed { code, .. } => code.map_or(true, |c| c >= 500),
            _ => false,
        }
    }

    /// Whether the orchestrator reported the target as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkloadOperationFailed {
                code: Some(404),
                ..
            }
        )
    }

    /// Get the HTTP status code an embedding API layer should answer with.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidDescriptor(_)
            | Self::InvalidCredentialFormat { .. }
            | Self::InvalidResourceSpecification { .. }
            | Self::InvalidCommand(_) => 400,
            Self::WorkloadCreationFailed { code, .. }
            | Self::WorkloadOperationFailed { code, .. } => {
                code.filter(|c| (400..500).contains(c)).unwrap_or(502)
            }
            Self::ClusterUnreachable { .. } | Self::Cancelled { .. } => 503,
            Self::ReadinessTimeout { .. } => 504,
            Self::ClientNotInitialized => 500,
        }
    }
}

fn target(namespace: &str, workload: Option<&str>) -> String {
    match workload {
        Some(w) => format!("{namespace}/{w}"),
        None => namespace.to_string(),
    }
}

/// Extract the human-readable message from an orchestrator error.
///
/// API status responses carry their own message; anything else (transport,
/// decoding) falls back to the client error's display text.
#[must_use]
pub fn orchestrator_message(err: &kube::Error) -> String {
    match err {
        kube::Error::Api(resp) if !resp.message.is_empty() => resp.message.clone(),
        kube::Error::Api(resp) => resp.reason.clone(),
        other => other.to_string(),
    }
}

fn orchestrator_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(resp) => Some(resp.code),
        _ => None,
    }
}

/// A specialized Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn operation_error_keeps_orchestrator_message() {
        let err = api_error(404, "NotFound", "pods \"web-pod\" not found");
        let wrapped = GatewayError::operation(Operation::Stop, "apps", Some("web-pod"), &err);

        assert_eq!(wrapped.kind(), ErrorKind::WorkloadOperationFailed);
        assert!(wrapped.is_not_found());
        assert_eq!(wrapped.http_status_code(), 404);
        assert_eq!(
            wrapped.to_string(),
            "stop failed for apps/web-pod: pods \"web-pod\" not found"
        );
    }

    #[test]
    fn creation_error_maps_conflict() {
        let err = api_error(409, "AlreadyExists", "pods \"web-pod\" already exists");
        let wrapped = GatewayError::creation("apps", "web", &err);

        assert_eq!(wrapped.kind(), ErrorKind::WorkloadCreationFailed);
        assert_eq!(wrapped.http_status_code(), 409);
        assert!(!wrapped.is_retriable());
    }

    #[test]
    fn empty_message_falls_back_to_reason() {
        let err = api_error(403, "Forbidden", "");
        assert_eq!(orchestrator_message(&err), "Forbidden");
    }

    #[test]
    fn retriable_kinds() {
        assert!(GatewayError::ClusterUnreachable {
            cluster: "c".to_string(),
            message: "connection refused".to_string(),
        }
        .is_retriable());

        let server_side = GatewayError::operation(
            Operation::List,
            "apps",
            None,
            &api_error(500, "InternalError", "etcd timeout"),
        );
        assert!(server_side.is_retriable());
        assert_eq!(server_side.http_status_code(), 502);

        assert!(!GatewayError::ClientNotInitialized.is_retriable());
        assert!(!GatewayError::InvalidCommand("x".to_string()).is_retriable());
    }

    #[test]
    fn status_codes() {
        assert_eq!(GatewayError::ClientNotInitialized.http_status_code(), 500);
        assert_eq!(
            GatewayError::ReadinessTimeout {
                namespace: "apps".to_string(),
                workload: "web-pod".to_string(),
                timeout: Duration::from_secs(30),
            }
            .http_status_code(),
            504
        );
        assert_eq!(
            GatewayError::InvalidResourceSpecification {
                token: "cpu:bogus".to_string(),
                reason: "not a number".to_string(),
            }
            .http_status_code(),
            400
        );
    }
}
