//! Lifecycle control.
//!
//! This module provides the [`Lifecycle`] trait and the [`LifecycleController`]
//! implementation that executes lifecycle verbs against a connected cluster.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use podgate_core::ConnectionDescriptor;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, MIN_READY_POLL_INTERVAL};
use crate::connection::{ClusterConnector, SessionHandle};
use crate::error::Operation;
use crate::project::{is_ready, project_all, project_record};
use crate::translate::{build_pod, pod_name_for, translate};
use crate::types::{
    ClusterInfo, ContainerRecord, ContainerStatusSummary, CreateContainerRequest,
    WorkloadSpecification,
};
use crate::{GatewayError, Result};

/// Lifecycle verbs over the workloads of a cluster.
///
/// `start` is the same operation as `restart`, and `delete` the same as
/// `stop`: pods have no stopped-but-retained state, so every verb that changes
/// a running workload deletes it and leaves any supervisor to recreate it.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// List one summary per declared container of every workload in a namespace.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the list call fails.
    async fn list(&self, namespace: &str) -> Result<Vec<ContainerStatusSummary>>;

    /// Read the platform record of one workload.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the workload cannot be read.
    async fn get(&self, namespace: &str, workload: &str) -> Result<ContainerRecord>;

    /// Create a single-container workload.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadCreationFailed` if the orchestrator rejects it.
    async fn create(&self, spec: &WorkloadSpecification) -> Result<()>;

    /// Start a workload. Equivalent to [`restart`](Self::restart).
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the delete call fails.
    async fn start(&self, namespace: &str, workload: &str) -> Result<()>;

    /// Stop a workload by deleting it with foreground propagation.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the delete call fails.
    async fn stop(&self, namespace: &str, workload: &str) -> Result<()>;

    /// Restart a workload by deleting it and leaving recreation to its
    /// supervisor, if any.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the delete call fails.
    async fn restart(&self, namespace: &str, workload: &str) -> Result<()>;

    /// Delete a workload. Equivalent to [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the delete call fails.
    async fn delete(&self, namespace: &str, workload: &str) -> Result<()>;

    /// Read the last `tail_lines` log lines of a container.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadOperationFailed` if the logs cannot be read.
    async fn logs(
        &self,
        namespace: &str,
        workload: &str,
        container: Option<&str>,
        tail_lines: Option<i64>,
    ) -> Result<String>;

    /// Wait until a workload in the session namespace is running and all of
    /// its containers are ready.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessTimeout` when `timeout` elapses, `Cancelled` when
    /// `cancel` fires, and `WorkloadOperationFailed` if a poll fails.
    async fn await_ready(
        &self,
        workload: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Translate a creation request and create the resulting workload.
    ///
    /// # Errors
    ///
    /// Returns any translation error, or the error of [`create`](Self::create).
    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<WorkloadSpecification> {
        let spec = translate(request)?;
        self.create(&spec).await?;
        Ok(spec)
    }
}

/// Poll `probe` until it reports ready, the deadline passes, or `cancel` fires.
///
/// The first probe runs immediately; later probes run every `interval`, which
/// is raised to [`MIN_READY_POLL_INTERVAL`] if shorter.
/// Suspension happens only inside this loop.
///
/// # Errors
///
/// Returns `Cancelled`, `ReadinessTimeout`, or the probe's own error.
pub async fn poll_readiness<F, Fut>(
    namespace: &str,
    workload: &str,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    let interval = interval.max(MIN_READY_POLL_INTERVAL);
    let deadline = Instant::now() + timeout;
    let cancelled = || GatewayError::Cancelled {
        namespace: namespace.to_string(),
        workload: workload.to_string(),
    };
    let timed_out = || GatewayError::ReadinessTimeout {
        namespace: namespace.to_string(),
        workload: workload.to_string(),
        timeout,
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            () = tokio::time::sleep_until(deadline) => return Err(timed_out()),
            ready = probe() => {
                if ready? {
                    return Ok(());
                }
            }
        }

        debug!(namespace, workload, "Workload not ready yet");

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            () = tokio::time::sleep_until(deadline) => return Err(timed_out()),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

/// Log an orchestrator-side failure and pass it through.
fn rejected(err: GatewayError) -> GatewayError {
    warn!(kind = ?err.kind(), error = %err, "Orchestrator call failed");
    err
}

/// Executes lifecycle verbs against a connected cluster.
///
/// The controller owns at most one session. Verbs used before a successful
/// [`connect`](Self::connect) fail with `ClientNotInitialized`.
#[derive(Debug, Default)]
pub struct LifecycleController {
    connector: ClusterConnector,
    session: Option<SessionHandle>,
}

impl LifecycleController {
    /// Create a disconnected controller.
    #[must_use]
    pub const fn new(config: GatewayConfig) -> Self {
        Self {
            connector: ClusterConnector::new(config),
            session: None,
        }
    }

    /// Create a controller around an established session.
    #[must_use]
    pub const fn with_session(config: GatewayConfig, session: SessionHandle) -> Self {
        Self {
            connector: ClusterConnector::new(config),
            session: Some(session),
        }
    }

    /// Get a reference to the gateway config.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        self.connector.config()
    }

    /// Connect to the descriptor's cluster, replacing any current session.
    ///
    /// The previous session is dropped before connecting, so a failed
    /// connect leaves the controller disconnected.
    ///
    /// # Errors
    ///
    /// Returns the connection error; see [`ClusterConnector::connect`].
    pub async fn connect(&mut self, descriptor: &ConnectionDescriptor) -> Result<ClusterInfo> {
        self.session = None;
        let session = self.connector.connect(descriptor).await?;
        let info = session.info().clone();
        self.session = Some(session);
        Ok(info)
    }

    /// Drop the current session.
    pub fn disconnect(&mut self) {
        self.session = None;
    }

    /// Whether a session is established.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The current session.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotInitialized` if no session is established.
    pub fn session(&self) -> Result<&SessionHandle> {
        self.session.as_ref().ok_or(GatewayError::ClientNotInitialized)
    }

    /// What the connect-time probe learned about the cluster.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotInitialized` if no session is established.
    pub fn cluster_info(&self) -> Result<ClusterInfo> {
        Ok(self.session()?.info().clone())
    }

    /// Re-probe the cluster and the session namespace.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotInitialized` without a session, otherwise see
    /// [`SessionHandle::health_check`].
    pub async fn health_check(&self) -> Result<ClusterInfo> {
        self.session()?.health_check().await
    }

    async fn delete_workload(
        &self,
        operation: Operation,
        namespace: &str,
        workload: &str,
        params: &DeleteParams,
    ) -> Result<()> {
        let session = self.session()?;
        session
            .pods(namespace)
            .delete(workload, params)
            .await
            .map_err(|e| {
                rejected(GatewayError::operation(operation, namespace, Some(workload), &e))
            })?;

        info!(
            session = %session.id(),
            operation = %operation,
            namespace,
            workload,
            "Deleted workload"
        );
        Ok(())
    }
}

#[async_trait]
impl Lifecycle for LifecycleController {
    async fn list(&self, namespace: &str) -> Result<Vec<ContainerStatusSummary>> {
        let session = self.session()?;
        let pods = session
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| rejected(GatewayError::operation(Operation::List, namespace, None, &e)))?;

        let summaries = project_all(&pods.items, Utc::now());
        info!(
            session = %session.id(),
            namespace,
            workloads = pods.items.len(),
            containers = summaries.len(),
            "Listed workloads"
        );
        Ok(summaries)
    }

    async fn get(&self, namespace: &str, workload: &str) -> Result<ContainerRecord> {
        let pod = self
            .session()?
            .pods(namespace)
            .get(workload)
            .await
            .map_err(|e| {
                rejected(GatewayError::operation(Operation::Get, namespace, Some(workload), &e))
            })?;
        Ok(project_record(&pod))
    }

    async fn create(&self, spec: &WorkloadSpecification) -> Result<()> {
        let session = self.session()?;
        let namespace = spec.namespace.as_str();
        let pod = build_pod(spec, self.config());

        session
            .pods(namespace)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| rejected(GatewayError::creation(namespace, spec.name.as_str(), &e)))?;

        info!(
            session = %session.id(),
            namespace,
            workload = %pod_name_for(spec.name.as_str()),
            image = %spec.image,
            "Created workload"
        );
        Ok(())
    }

    async fn start(&self, namespace: &str, workload: &str) -> Result<()> {
        self.delete_workload(
            Operation::Start,
            namespace,
            workload,
            &DeleteParams::default(),
        )
        .await
    }

    async fn stop(&self, namespace: &str, workload: &str) -> Result<()> {
        self.delete_workload(
            Operation::Stop,
            namespace,
            workload,
            &DeleteParams::foreground(),
        )
        .await
    }

    async fn restart(&self, namespace: &str, workload: &str) -> Result<()> {
        self.delete_workload(
            Operation::Restart,
            namespace,
            workload,
            &DeleteParams::default(),
        )
        .await
    }

    async fn delete(&self, namespace: &str, workload: &str) -> Result<()> {
        self.delete_workload(
            Operation::Delete,
            namespace,
            workload,
            &DeleteParams::foreground(),
        )
        .await
    }

    async fn logs(
        &self,
        namespace: &str,
        workload: &str,
        container: Option<&str>,
        tail_lines: Option<i64>,
    ) -> Result<String> {
        let params = LogParams {
            container: container.map(str::to_string),
            tail_lines: Some(tail_lines.unwrap_or(self.config().log_tail_lines)),
            ..LogParams::default()
        };

        self.session()?
            .pods(namespace)
            .logs(workload, &params)
            .await
            .map_err(|e| {
                rejected(GatewayError::operation(Operation::Logs, namespace, Some(workload), &e))
            })
    }

    async fn await_ready(
        &self,
        workload: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let session = self.session()?;
        let namespace = session.namespace();
        let pods = session.pods(namespace);

        let probe = || {
            let pods = pods.clone();
            async move {
                pods.get(workload).await.map(|pod| is_ready(&pod)).map_err(|e| {
                    rejected(GatewayError::operation(
                        Operation::AwaitReady,
                        namespace,
                        Some(workload),
                        &e,
                    ))
                })
            }
        };

        poll_readiness(
            namespace,
            workload,
            timeout,
            self.config().ready_poll_interval(),
            cancel,
            probe,
        )
        .await?;

        info!(session = %session.id(), namespace, workload, "Workload ready");
        Ok(())
    }
}

/// An in-memory lifecycle for testing without a cluster.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::types::{ContainerStatus, PodPhase};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// A lifecycle that keeps workloads in memory.
    ///
    /// Workloads registered as supervised come back under a new instance name
    /// (`<base>-<generation>`) after any delete, the way a replica controller
    /// would recreate them.
    pub struct MockLifecycle {
        namespace: String,
        poll_interval: Duration,
        workloads: Mutex<BTreeMap<(String, String), MockWorkload>>,
    }

    #[derive(Clone)]
    struct MockWorkload {
        base: String,
        container: String,
        image: String,
        status: ContainerStatus,
        ready: bool,
        supervised: bool,
        generation: u32,
        logs: Vec<String>,
    }

    impl Default for MockLifecycle {
        fn default() -> Self {
            Self::new("default")
        }
    }

    impl MockLifecycle {
        /// Create a mock whose readiness waits poll `namespace`.
        #[must_use]
        pub fn new(namespace: &str) -> Self {
            Self {
                namespace: namespace.to_string(),
                poll_interval: GatewayConfig::default().ready_poll_interval(),
                workloads: Mutex::new(BTreeMap::new()),
            }
        }

        /// Set the readiness poll interval.
        #[must_use]
        pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
            self.poll_interval = interval;
            self
        }

        /// Register a supervised workload, named `<base>-1`.
        pub fn add_supervised(&self, namespace: &str, base: &str, image: &str) -> String {
            let name = format!("{base}-1");
            self.workloads.lock().insert(
                (namespace.to_string(), name.clone()),
                MockWorkload {
                    base: base.to_string(),
                    container: base.to_string(),
                    image: image.to_string(),
                    status: ContainerStatus::Pending,
                    ready: false,
                    supervised: true,
                    generation: 1,
                    logs: Vec::new(),
                },
            );
            name
        }

        /// Mark a workload running and ready, or pending and not ready.
        pub fn set_ready(&self, namespace: &str, workload: &str, ready: bool) {
            if let Some(w) = self.workloads.lock().get_mut(&key(namespace, workload)) {
                w.ready = ready;
                w.status = if ready {
                    ContainerStatus::Running
                } else {
                    ContainerStatus::Pending
                };
            }
        }

        /// Set the derived status of a workload's container.
        pub fn set_status(&self, namespace: &str, workload: &str, status: ContainerStatus) {
            if let Some(w) = self.workloads.lock().get_mut(&key(namespace, workload)) {
                w.status = status;
            }
        }

        /// Append a log line to a workload.
        pub fn push_log(&self, namespace: &str, workload: &str, line: &str) {
            if let Some(w) = self.workloads.lock().get_mut(&key(namespace, workload)) {
                w.logs.push(line.to_string());
            }
        }

        /// Get the number of workloads across all namespaces.
        #[must_use]
        pub fn workload_count(&self) -> usize {
            self.workloads.lock().len()
        }

        fn remove(&self, operation: Operation, namespace: &str, workload: &str) -> Result<()> {
            let mut workloads = self.workloads.lock();
            let removed = workloads
                .remove(&key(namespace, workload))
                .ok_or_else(|| not_found(operation, namespace, workload))?;

            if removed.supervised {
                let generation = removed.generation + 1;
                let name = format!("{}-{generation}", removed.base);
                workloads.insert(
                    (namespace.to_string(), name),
                    MockWorkload {
                        status: ContainerStatus::Pending,
                        ready: false,
                        generation,
                        logs: Vec::new(),
                        ..removed
                    },
                );
            }
            Ok(())
        }
    }

    fn key(namespace: &str, workload: &str) -> (String, String) {
        (namespace.to_string(), workload.to_string())
    }

    fn not_found(operation: Operation, namespace: &str, workload: &str) -> GatewayError {
        GatewayError::WorkloadOperationFailed {
            operation,
            target: format!("{namespace}/{workload}"),
            message: format!("pods \"{workload}\" not found"),
            code: Some(404),
        }
    }

    #[async_trait]
    impl Lifecycle for MockLifecycle {
        async fn list(&self, namespace: &str) -> Result<Vec<ContainerStatusSummary>> {
            let workloads = self.workloads.lock();
            Ok(workloads
                .iter()
                .filter(|((ns, _), _)| ns == namespace)
                .map(|((ns, name), w)| ContainerStatusSummary {
                    name: w.container.clone(),
                    namespace: ns.clone(),
                    image: w.image.clone(),
                    status: w.status,
                    pod_name: name.clone(),
                    restart_count: 0,
                    age: "0m".to_string(),
                    node: Some("mock-node".to_string()),
                    labels: None,
                    container_id: None,
                })
                .collect())
        }

        async fn get(&self, namespace: &str, workload: &str) -> Result<ContainerRecord> {
            let workloads = self.workloads.lock();
            let w = workloads
                .get(&key(namespace, workload))
                .ok_or_else(|| not_found(Operation::Get, namespace, workload))?;

            Ok(ContainerRecord {
                pod_name: workload.to_string(),
                namespace: namespace.to_string(),
                container_name: Some(w.container.clone()),
                image: Some(w.image.clone()),
                phase: if w.ready {
                    PodPhase::Running
                } else {
                    PodPhase::Pending
                },
                ready: w.ready,
                pod_ip: None,
                node_name: Some("mock-node".to_string()),
                restart_count: 0,
                started_at: None,
                message: None,
                cpu_request: None,
                memory_request: None,
                cpu_limit: None,
                memory_limit: None,
            })
        }

        async fn create(&self, spec: &WorkloadSpecification) -> Result<()> {
            let namespace = spec.namespace.as_str();
            let name = pod_name_for(spec.name.as_str());
            let mut workloads = self.workloads.lock();

            if workloads.contains_key(&key(namespace, &name)) {
                return Err(GatewayError::WorkloadCreationFailed {
                    namespace: namespace.to_string(),
                    name: spec.name.to_string(),
                    message: format!("pods \"{name}\" already exists"),
                    code: Some(409),
                });
            }

            workloads.insert(
                (namespace.to_string(), name),
                MockWorkload {
                    base: spec.name.to_string(),
                    container: spec.name.to_string(),
                    image: spec.image.clone(),
                    status: ContainerStatus::Pending,
                    ready: false,
                    supervised: false,
                    generation: 1,
                    logs: Vec::new(),
                },
            );
            Ok(())
        }

        async fn start(&self, namespace: &str, workload: &str) -> Result<()> {
            self.remove(Operation::Start, namespace, workload)
        }

        async fn stop(&self, namespace: &str, workload: &str) -> Result<()> {
            self.remove(Operation::Stop, namespace, workload)
        }

        async fn restart(&self, namespace: &str, workload: &str) -> Result<()> {
            self.remove(Operation::Restart, namespace, workload)
        }

        async fn delete(&self, namespace: &str, workload: &str) -> Result<()> {
            self.remove(Operation::Delete, namespace, workload)
        }

        async fn logs(
            &self,
            namespace: &str,
            workload: &str,
            _container: Option<&str>,
            tail_lines: Option<i64>,
        ) -> Result<String> {
            let workloads = self.workloads.lock();
            let w = workloads
                .get(&key(namespace, workload))
                .ok_or_else(|| not_found(Operation::Logs, namespace, workload))?;

            let tail = tail_lines
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(w.logs.len());
            let skip = w.logs.len().saturating_sub(tail);
            Ok(w.logs[skip..].iter().map(|l| format!("{l}\n")).collect())
        }

        async fn await_ready(
            &self,
            workload: &str,
            timeout: Duration,
            cancel: &CancellationToken,
        ) -> Result<()> {
            let namespace = self.namespace.as_str();
            let probe = || {
                let ready = self
                    .workloads
                    .lock()
                    .get(&key(namespace, workload))
                    .map(|w| w.ready)
                    .ok_or_else(|| not_found(Operation::AwaitReady, namespace, workload));
                async move { ready }
            };

            poll_readiness(
                namespace,
                workload,
                timeout,
                self.poll_interval,
                cancel,
                probe,
            )
            .await
        }
    }
}
