//! Types for the gateway crate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use podgate_core::ResourceName;
use serde::{Deserialize, Serialize};

use crate::quantity::ResourceQuantity;

/// A platform-level creation request, as received from the API layer.
///
/// The text fields are free-form and parsed by the workload translator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    /// Container name; the workload is named `<name>-pod`.
    pub name: String,
    /// Target namespace.
    pub namespace: String,
    /// Container image reference.
    pub image: String,
    /// Optional command line, split with shell quoting rules.
    #[serde(default)]
    pub command: String,
    /// Comma-separated container ports, e.g. `80, 443`.
    #[serde(default)]
    pub ports: String,
    /// One `KEY=VALUE` pair per line.
    #[serde(default)]
    pub env: String,
    /// Comma-separated `cpu:<qty>` / `memory:<qty>` requests.
    #[serde(default)]
    pub resources: String,
}

/// Resource requests parsed from a creation request. Limits cannot be set
/// through this path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRequests {
    /// CPU request.
    pub cpu: Option<ResourceQuantity>,
    /// Memory request.
    pub memory: Option<ResourceQuantity>,
}

impl ResourceRequests {
    /// Whether neither request is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// A structured single-container workload, ready to be turned into a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpecification {
    /// Container name and workload base name.
    pub name: ResourceName,
    /// Target namespace.
    pub namespace: ResourceName,
    /// Container image reference.
    pub image: String,
    /// Container command; empty keeps the image entrypoint.
    pub command: Vec<String>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Container ports, in request order.
    pub ports: Vec<u16>,
    /// Resource requests.
    pub resources: ResourceRequests,
}

/// Derived status of one container.
///
/// Never copied from the orchestrator's phase string; see
/// [`crate::project::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContainerStatus {
    /// The container is running.
    Running,
    /// The container is waiting to start.
    Pending,
    /// The container exited with code 0.
    Succeeded,
    /// The container exited with a non-zero code.
    Failed,
    /// No state has been reported yet.
    #[default]
    Unknown,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "Running",
            Self::Pending => "Pending",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Phase of the pod lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PodPhase {
    /// Pod has been accepted but containers are not yet running.
    Pending,
    /// Pod is running with at least one container.
    Running,
    /// All containers terminated successfully.
    Succeeded,
    /// At least one container failed.
    Failed,
    /// Pod status cannot be determined.
    #[default]
    Unknown,
}

impl PodPhase {
    /// Parse a pod phase from a Kubernetes phase string.
    #[must_use]
    pub fn from_k8s_phase(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// One row of a `list` result: one declared container of one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusSummary {
    /// Container name.
    pub name: String,
    /// Namespace of the workload.
    pub namespace: String,
    /// Container image.
    pub image: String,
    /// Derived status.
    pub status: ContainerStatus,
    /// Name of the owning workload.
    pub pod_name: String,
    /// Restarts reported for this container.
    pub restart_count: u32,
    /// Coarse age of the workload, e.g. `5m`, `3h`, `2d`.
    pub age: String,
    /// Node the workload is scheduled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Workload labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Runtime identifier of the container, e.g. `containerd://…`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// Platform record for a single workload.
///
/// Resource fields describe the first declared container only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    /// Workload name.
    pub pod_name: String,
    /// Namespace of the workload.
    pub namespace: String,
    /// First declared container's name.
    pub container_name: Option<String>,
    /// First declared container's image.
    pub image: Option<String>,
    /// Pod phase as reported by the orchestrator.
    pub phase: PodPhase,
    /// Whether every declared container is ready.
    pub ready: bool,
    /// Pod IP address.
    pub pod_ip: Option<String>,
    /// Node the workload is scheduled on.
    pub node_name: Option<String>,
    /// Restarts of the first container.
    pub restart_count: u32,
    /// When the workload started.
    pub started_at: Option<DateTime<Utc>>,
    /// Orchestrator status message.
    pub message: Option<String>,
    /// CPU request.
    pub cpu_request: Option<String>,
    /// Memory request.
    pub memory_request: Option<String>,
    /// CPU limit.
    pub cpu_limit: Option<String>,
    /// Memory limit.
    pub memory_limit: Option<String>,
}

/// What the liveness probe learned about a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster label from the descriptor.
    pub cluster: String,
    /// Server version, e.g. `v1.31.2`.
    pub version: String,
    /// Server platform, e.g. `linux/amd64`.
    pub platform: String,
    /// Effective namespace of the session.
    pub namespace: String,
}
