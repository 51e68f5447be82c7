//! State projection.
//!
//! Converts orchestrator pods into platform summaries. Projection never
//! fails: missing status data degrades to `Unknown`, zero counts, or absent
//! optional fields.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStatus as K8sContainerStatus, Pod,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::quantity::ResourceQuantity;
use crate::types::{ContainerRecord, ContainerStatus, ContainerStatusSummary, PodPhase};

/// Rendered when a workload has no creation timestamp.
pub const UNKNOWN_AGE: &str = "<unknown>";

/// Classify a container's reported sub-state.
///
/// Running wins over waiting, which wins over terminated. A terminated
/// container with exit code 0 succeeded; any other code failed.
#[must_use]
pub fn classify(state: Option<&ContainerState>) -> ContainerStatus {
    let Some(state) = state else {
        return ContainerStatus::Unknown;
    };

    if state.running.is_some() {
        ContainerStatus::Running
    } else if state.waiting.is_some() {
        ContainerStatus::Pending
    } else if let Some(terminated) = &state.terminated {
        if terminated.exit_code == 0 {
            ContainerStatus::Succeeded
        } else {
            ContainerStatus::Failed
        }
    } else {
        ContainerStatus::Unknown
    }
}

/// Render the age of a workload at the coarsest applicable unit.
///
/// Under an hour renders whole minutes, under a day whole hours, otherwise
/// whole days. Timestamps in the future render as `0m`.
#[must_use]
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes().max(0);

    if minutes < 60 {
        format!("{minutes}m")
    } else if minutes < 24 * 60 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / (24 * 60))
    }
}

/// Project one workload into one summary per declared container.
#[must_use]
pub fn project(pod: &Pod, now: DateTime<Utc>) -> Vec<ContainerStatusSummary> {
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let age = pod
        .metadata
        .creation_timestamp
        .as_ref()
        .map_or_else(|| UNKNOWN_AGE.to_string(), |t| format_age(t.0, now));
    let node = pod.spec.as_ref().and_then(|s| s.node_name.clone());
    let labels = pod.metadata.labels.clone();

    declared_containers(pod)
        .iter()
        .map(|container| {
            let status = container_status(pod, &container.name);

            ContainerStatusSummary {
                name: container.name.clone(),
                namespace: namespace.clone(),
                image: container.image.clone().unwrap_or_default(),
                status: classify(status.and_then(|s| s.state.as_ref())),
                pod_name: pod_name.clone(),
                restart_count: status.map_or(0, |s| s.restart_count.unsigned_abs()),
                age: age.clone(),
                node: node.clone(),
                labels: labels.clone(),
                container_id: status.and_then(|s| s.container_id.clone()),
            }
        })
        .collect()
}

/// Project a list of workloads, flattening their containers.
#[must_use]
pub fn project_all(pods: &[Pod], now: DateTime<Utc>) -> Vec<ContainerStatusSummary> {
    pods.iter().flat_map(|pod| project(pod, now)).collect()
}

/// Build the platform record for a single workload.
///
/// Resource fields come from the first declared container only.
#[must_use]
pub fn project_record(pod: &Pod) -> ContainerRecord {
    let status = pod.status.as_ref();
    let first = declared_containers(pod).first();
    let resources = first.and_then(|c| c.resources.as_ref());
    let requests = resources.and_then(|r| r.requests.as_ref());
    let limits = resources.and_then(|r| r.limits.as_ref());

    ContainerRecord {
        pod_name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        container_name: first.map(|c| c.name.clone()),
        image: first.and_then(|c| c.image.clone()),
        phase: status
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from_k8s_phase)
            .unwrap_or_default(),
        ready: is_ready(pod),
        pod_ip: status.and_then(|s| s.pod_ip.clone()),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        restart_count: status
            .and_then(|s| s.container_statuses.as_ref())
            .and_then(|cs| cs.first())
            .map_or(0, |c| c.restart_count.unsigned_abs()),
        started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        message: status.and_then(|s| s.message.clone()),
        cpu_request: non_zero(requests.and_then(|m| m.get("cpu"))),
        memory_request: non_zero(requests.and_then(|m| m.get("memory"))),
        cpu_limit: non_zero(limits.and_then(|m| m.get("cpu"))),
        memory_limit: non_zero(limits.and_then(|m| m.get("memory"))),
    }
}

/// Whether the workload is running and every declared container is ready.
///
/// A pod without declared containers is judged on its reported statuses.
#[must_use]
pub fn is_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    if status.phase.as_deref() != Some("Running") {
        return false;
    }

    let declared = declared_containers(pod);
    if declared.is_empty() {
        return status
            .container_statuses
            .as_ref()
            .is_some_and(|cs| !cs.is_empty() && cs.iter().all(|c| c.ready));
    }

    declared
        .iter()
        .all(|c| container_status(pod, &c.name).is_some_and(|s| s.ready))
}

fn declared_containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default()
}

fn container_status<'a>(pod: &'a Pod, name: &str) -> Option<&'a K8sContainerStatus> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|s| s.name == name)
}

fn non_zero(quantity: Option<&Quantity>) -> Option<String> {
    let raw = &quantity?.0;
    let is_zero = raw
        .parse::<ResourceQuantity>()
        .is_ok_and(|q| q.is_zero());
    (!is_zero).then(|| raw.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use k8s_openapi::api::core::v1::{
        ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting, PodSpec,
        PodStatus, ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn running() -> ContainerState {
        ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        }
    }

    fn waiting() -> ContainerState {
        ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some("ContainerCreating".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn terminated(exit_code: i32) -> ContainerState {
        ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(format!("registry.local/{name}:1")),
            ..Default::default()
        }
    }

    fn status_for(name: &str, state: ContainerState, ready: bool) -> K8sContainerStatus {
        K8sContainerStatus {
            name: name.to_string(),
            ready,
            restart_count: 3,
            container_id: Some(format!("containerd://{name}")),
            state: Some(state),
            ..Default::default()
        }
    }

    fn pod(containers: Vec<Container>, statuses: Vec<K8sContainerStatus>, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web-pod".to_string()),
                namespace: Some("apps".to_string()),
                creation_timestamp: Some(Time(now() - Duration::minutes(90))),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers,
                node_name: Some("node-1".to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(statuses),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn classification_follows_priority() {
        assert_eq!(classify(None), ContainerStatus::Unknown);
        assert_eq!(classify(Some(&ContainerState::default())), ContainerStatus::Unknown);
        assert_eq!(classify(Some(&running())), ContainerStatus::Running);
        assert_eq!(classify(Some(&waiting())), ContainerStatus::Pending);
        assert_eq!(classify(Some(&terminated(0))), ContainerStatus::Succeeded);
        assert_eq!(classify(Some(&terminated(137))), ContainerStatus::Failed);

        let mut inconsistent = terminated(1);
        inconsistent.waiting = waiting().waiting;
        assert_eq!(classify(Some(&inconsistent)), ContainerStatus::Pending);
        inconsistent.running = running().running;
        assert_eq!(classify(Some(&inconsistent)), ContainerStatus::Running);
    }

    #[test]
    fn age_uses_coarsest_unit() {
        let at = |d: Duration| format_age(now() - d, now());
        assert_eq!(at(Duration::seconds(30)), "0m");
        assert_eq!(at(Duration::minutes(59)), "59m");
        assert_eq!(at(Duration::minutes(60)), "1h");
        assert_eq!(at(Duration::hours(23) + Duration::minutes(59)), "23h");
        assert_eq!(at(Duration::hours(24)), "1d");
        assert_eq!(at(Duration::days(9) + Duration::hours(23)), "9d");
    }

    #[test]
    fn future_timestamp_renders_zero() {
        assert_eq!(format_age(now() + Duration::minutes(5), now()), "0m");
    }

    #[test]
    fn project_flattens_declared_containers() {
        let p = pod(
            vec![container("web"), container("sidecar")],
            vec![status_for("web", running(), true)],
            "Running",
        );

        let summaries = project(&p, now());
        assert_eq!(summaries.len(), 2);

        let web = &summaries[0];
        assert_eq!(web.name, "web");
        assert_eq!(web.pod_name, "web-pod");
        assert_eq!(web.namespace, "apps");
        assert_eq!(web.status, ContainerStatus::Running);
        assert_eq!(web.restart_count, 3);
        assert_eq!(web.container_id.as_deref(), Some("containerd://web"));
        assert_eq!(web.age, "1h");
        assert_eq!(web.node.as_deref(), Some("node-1"));

        let sidecar = &summaries[1];
        assert_eq!(sidecar.status, ContainerStatus::Unknown);
        assert_eq!(sidecar.restart_count, 0);
        assert!(sidecar.container_id.is_none());
    }

    #[test]
    fn project_all_sums_containers() {
        let pods = vec![
            pod(vec![container("a")], vec![], "Pending"),
            pod(vec![container("b"), container("c")], vec![], "Pending"),
            pod(vec![], vec![], "Pending"),
        ];
        assert_eq!(project_all(&pods, now()).len(), 3);
    }

    #[test]
    fn missing_timestamp_and_status_degrade() {
        let mut p = pod(vec![container("web")], vec![], "Pending");
        p.metadata.creation_timestamp = None;
        p.status = None;

        let summaries = project(&p, now());
        assert_eq!(summaries[0].age, UNKNOWN_AGE);
        assert_eq!(summaries[0].status, ContainerStatus::Unknown);
    }

    #[test]
    fn readiness_requires_every_declared_container() {
        let both_ready = pod(
            vec![container("web"), container("sidecar")],
            vec![
                status_for("web", running(), true),
                status_for("sidecar", running(), true),
            ],
            "Running",
        );
        assert!(is_ready(&both_ready));

        let one_missing = pod(
            vec![container("web"), container("sidecar")],
            vec![status_for("web", running(), true)],
            "Running",
        );
        assert!(!is_ready(&one_missing));

        let pending = pod(
            vec![container("web")],
            vec![status_for("web", waiting(), true)],
            "Pending",
        );
        assert!(!is_ready(&pending));
    }

    #[test]
    fn record_reads_first_container_and_skips_zero_quantities() {
        let mut first = container("web");
        first.resources = Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("250m".to_string())),
                ("memory".to_string(), Quantity("0".to_string())),
            ])),
            limits: Some(BTreeMap::from([(
                "memory".to_string(),
                Quantity("512Mi".to_string()),
            )])),
            ..Default::default()
        });

        let mut p = pod(
            vec![first, container("sidecar")],
            vec![
                status_for("web", running(), true),
                status_for("sidecar", running(), true),
            ],
            "Running",
        );
        if let Some(status) = p.status.as_mut() {
            status.pod_ip = Some("10.0.0.7".to_string());
        }

        let record = project_record(&p);
        assert_eq!(record.pod_name, "web-pod");
        assert_eq!(record.container_name.as_deref(), Some("web"));
        assert_eq!(record.phase, PodPhase::Running);
        assert!(record.ready);
        assert_eq!(record.pod_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(record.restart_count, 3);
        assert_eq!(record.cpu_request.as_deref(), Some("250m"));
        assert!(record.memory_request.is_none());
        assert!(record.cpu_limit.is_none());
        assert_eq!(record.memory_limit.as_deref(), Some("512Mi"));
    }

    #[test]
    fn record_not_ready_while_a_declared_container_has_no_status() {
        let p = pod(
            vec![container("web"), container("sidecar")],
            vec![status_for("web", running(), true)],
            "Running",
        );

        let record = project_record(&p);
        assert_eq!(record.phase, PodPhase::Running);
        assert!(!record.ready);
        assert_eq!(record.container_name.as_deref(), Some("web"));
    }
}
