//! Subcommands and their execution.

use std::time::Duration;

use clap::{Args, Subcommand};
use podgate_gateway::{ClusterInfo, CreateContainerRequest, Lifecycle, LifecycleController};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// A workload addressed by name, optionally in a namespace other than the
/// session's.
#[derive(Args, Debug)]
pub struct Target {
    /// Workload (pod) name.
    pub workload: String,

    /// Namespace; defaults to the descriptor's target namespace.
    #[arg(long, short)]
    pub namespace: Option<String>,
}

/// Lifecycle verbs.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the cluster and print its version.
    Probe {
        /// Also check that the session namespace exists.
        #[arg(long)]
        health: bool,
    },

    /// List one row per container in a namespace.
    List {
        /// Namespace; defaults to the descriptor's target namespace.
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Create a single-container workload named `<name>-pod`.
    Create {
        /// Container name.
        #[arg(long)]
        name: String,

        /// Container image.
        #[arg(long)]
        image: String,

        /// Namespace; defaults to the descriptor's target namespace.
        #[arg(long, short)]
        namespace: Option<String>,

        /// Command line, split with shell quoting rules.
        #[arg(long, default_value = "")]
        command: String,

        /// Comma-separated container ports.
        #[arg(long, default_value = "")]
        ports: String,

        /// Environment variable as KEY=VALUE; repeatable.
        #[arg(long = "env", short = 'e')]
        env: Vec<String>,

        /// Comma-separated `cpu:<qty>` / `memory:<qty>` requests.
        #[arg(long, default_value = "")]
        resources: String,

        /// Wait up to this many seconds for the workload to become ready.
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Start a workload (delete and let its supervisor recreate it).
    Start(Target),

    /// Stop a workload (foreground delete).
    Stop(Target),

    /// Restart a workload (delete and let its supervisor recreate it).
    Restart(Target),

    /// Delete a workload (foreground delete).
    Delete(Target),

    /// Show the platform record of a workload.
    Get(Target),

    /// Print the tail of a container's logs.
    Logs {
        #[command(flatten)]
        target: Target,

        /// Container name; required for multi-container workloads.
        #[arg(long, short)]
        container: Option<String>,

        /// Number of lines; defaults to `PODGATE_LOG_TAIL_LINES`.
        #[arg(long)]
        tail: Option<i64>,
    },

    /// Wait for a workload in the session namespace to become ready.
    Wait {
        /// Workload (pod) name.
        workload: String,

        /// Timeout in seconds.
        #[arg(long, default_value = "120")]
        timeout: u64,
    },
}

/// Run one command against a connected controller.
pub async fn run(
    controller: &LifecycleController,
    info: ClusterInfo,
    command: Command,
) -> anyhow::Result<Value> {
    let session_ns = info.namespace.clone();
    let ns = |namespace: Option<String>| namespace.unwrap_or_else(|| session_ns.clone());

    let output = match command {
        Command::Probe { health } => {
            let info = if health {
                controller.health_check().await?
            } else {
                info
            };
            serde_json::to_value(info)?
        }
        Command::List { namespace } => {
            serde_json::to_value(controller.list(&ns(namespace)).await?)?
        }
        Command::Create {
            name,
            image,
            namespace,
            command,
            ports,
            env,
            resources,
            wait,
        } => {
            let namespace = ns(namespace);
            if wait.is_some() && namespace != session_ns {
                anyhow::bail!(
                    "--wait polls the session namespace '{session_ns}', \
                     not '{namespace}'; reconnect with that target namespace"
                );
            }

            let request = CreateContainerRequest {
                name,
                namespace,
                image,
                command,
                ports,
                env: env.join("\n"),
                resources,
            };
            let spec = controller.create_container(&request).await?;
            let workload = podgate_gateway::translate::pod_name_for(spec.name.as_str());

            if let Some(seconds) = wait {
                await_ready(controller, &workload, Duration::from_secs(seconds)).await?;
            }
            json!({
                "operation": "create",
                "namespace": spec.namespace.as_str(),
                "workload": workload,
                "ready": wait.is_some(),
            })
        }
        Command::Start(target) => {
            let namespace = ns(target.namespace);
            controller.start(&namespace, &target.workload).await?;
            done("start", &namespace, &target.workload)
        }
        Command::Stop(target) => {
            let namespace = ns(target.namespace);
            controller.stop(&namespace, &target.workload).await?;
            done("stop", &namespace, &target.workload)
        }
        Command::Restart(target) => {
            let namespace = ns(target.namespace);
            controller.restart(&namespace, &target.workload).await?;
            done("restart", &namespace, &target.workload)
        }
        Command::Delete(target) => {
            let namespace = ns(target.namespace);
            controller.delete(&namespace, &target.workload).await?;
            done("delete", &namespace, &target.workload)
        }
        Command::Get(target) => {
            let record = controller
                .get(&ns(target.namespace), &target.workload)
                .await?;
            serde_json::to_value(record)?
        }
        Command::Logs {
            target,
            container,
            tail,
        } => {
            let logs = controller
                .logs(
                    &ns(target.namespace),
                    &target.workload,
                    container.as_deref(),
                    tail,
                )
                .await?;
            Value::String(logs)
        }
        Command::Wait { workload, timeout } => {
            await_ready(controller, &workload, Duration::from_secs(timeout)).await?;
            json!({
                "operation": "wait",
                "namespace": session_ns,
                "workload": workload,
                "ready": true,
            })
        }
    };

    Ok(output)
}

fn done(operation: &str, namespace: &str, workload: &str) -> Value {
    json!({
        "operation": operation,
        "namespace": namespace,
        "workload": workload,
    })
}

/// Wait for readiness, cancelling on Ctrl-C.
async fn await_ready(
    controller: &LifecycleController,
    workload: &str,
    timeout: Duration,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling wait");
            trigger.cancel();
        }
    });

    let result = controller.await_ready(workload, timeout, &cancel).await;
    watcher.abort();
    Ok(result?)
}
