//! Container-lifecycle gateway over Kubernetes.
//!
//! This crate turns platform-level container requests into pods and back:
//!
//! - [`ClusterConnector`] resolves a connection descriptor into an
//!   authenticated [`SessionHandle`], probing the server version first
//! - [`translate`](translate::translate) parses free-form creation requests
//!   into a [`WorkloadSpecification`]
//! - [`project`] derives per-container status summaries from pods
//! - [`LifecycleController`] implements the [`Lifecycle`] verbs
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 Caller (API layer / CLI)                  │
//! └───────────────────────────────────────────────────────────┘
//!               │ ConnectionDescriptor    │ lifecycle verbs
//!               ▼                         ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                   LifecycleController                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐   │
//! │  │  Cluster     │  │  Workload    │  │  State         │   │
//! │  │  Connector   │  │  Translator  │  │  Projector     │   │
//! │  └──────────────┘  └──────────────┘  └────────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Kubernetes API Server                    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use podgate_core::{ConnectionDescriptor, Credential, TlsPolicy};
//! use podgate_gateway::{CreateContainerRequest, GatewayConfig, Lifecycle, LifecycleController};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = ConnectionDescriptor {
//!     name: "staging".to_string(),
//!     endpoint: "https://k8s.staging.example:6443".to_string(),
//!     credential: Credential::BearerToken("token".to_string()),
//!     target_namespace: Some("team-a".to_string()),
//!     tls: TlsPolicy::Verify,
//! };
//!
//! let mut controller = LifecycleController::new(GatewayConfig::from_env());
//! controller.connect(&descriptor).await?;
//!
//! let request = CreateContainerRequest {
//!     name: "web".to_string(),
//!     namespace: "team-a".to_string(),
//!     image: "nginx:1.27".to_string(),
//!     ports: "80".to_string(),
//!     resources: "cpu:250m, memory:128Mi".to_string(),
//!     ..Default::default()
//! };
//! controller.create_container(&request).await?;
//! controller
//!     .await_ready("web-pod", Duration::from_secs(60), &CancellationToken::new())
//!     .await?;
//!
//! for summary in controller.list("team-a").await? {
//!     println!("{} {} {}", summary.pod_name, summary.status, summary.age);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to use [`MockLifecycle`], an in-memory
//! implementation of [`Lifecycle`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod project;
pub mod quantity;
pub mod translate;
pub mod types;

pub use config::GatewayConfig;
pub use connection::{ClusterConnector, SessionHandle};
pub use error::{ErrorKind, GatewayError, Operation, Result};
pub use lifecycle::{Lifecycle, LifecycleController};
pub use quantity::{QuantityError, ResourceQuantity};
pub use types::{
    ClusterInfo, ContainerRecord, ContainerStatus, ContainerStatusSummary, CreateContainerRequest,
    PodPhase, ResourceRequests, WorkloadSpecification,
};

#[cfg(any(test, feature = "test-utils"))]
pub use lifecycle::mock::MockLifecycle;
