//! Podgate CLI - operator front end for the container-lifecycle gateway.
//!
//! This is the entry point for the `podgate` binary. Every invocation reads a
//! connection descriptor, connects, runs one verb and prints the result as
//! JSON on stdout. Logs go to stderr and are filtered with `RUST_LOG`.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use podgate_core::ConnectionDescriptor;
use podgate_gateway::{GatewayConfig, LifecycleController};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::Command;

/// Podgate - run container lifecycle verbs against a Kubernetes cluster.
#[derive(Parser, Debug)]
#[command(name = "podgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON connection descriptor.
    #[arg(long, env = "PODGATE_DESCRIPTOR")]
    descriptor: PathBuf,

    #[command(subcommand)]
    command: Command,
}

fn load_descriptor(path: &Path) -> anyhow::Result<ConnectionDescriptor> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse descriptor {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,podgate=debug".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let descriptor = load_descriptor(&args.descriptor)?;
    let config = GatewayConfig::from_env();

    tracing::debug!(
        cluster = %descriptor.name,
        credential = %descriptor.credential.kind(),
        default_namespace = %config.default_namespace,
        "Configuration loaded"
    );

    let mut controller = LifecycleController::new(config);
    let info = controller.connect(&descriptor).await?;

    let output = commands::run(&controller, info, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
