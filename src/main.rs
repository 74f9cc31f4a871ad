/// kapacitor-provider - declarative Kapacitor task management
///
/// Reconciles clusters and firewall rules declared in a YAML file against the
/// tasks of a Kapacitor server.
mod config;
mod identifier;
mod kapacitor;
mod resources;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DefinitionsFile;
use crate::identifier::QualifiedIdentifier;
use crate::kapacitor::TaskApi;
use crate::resources::lifecycle;
use crate::resources::TaskResource;
use crate::state::State;

#[derive(Parser)]
#[command(name = "kapacitor-provider")]
#[command(about = "Manage Kapacitor tasks from declarative resource definitions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Resource definitions file path
    #[arg(short, long, default_value = "kapacitor.yaml")]
    config: PathBuf,

    /// State file path
    #[arg(short, long, default_value = "kapacitor-state.json")]
    state: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update every declared resource
    Apply,

    /// Delete every tracked resource
    Destroy,

    /// Show tracked resources as seen by the server
    Status,

    /// Check the server is reachable
    Ping,

    /// Generate example definitions file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("kapacitor_provider={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Apply => apply(&cli).await,
        Commands::Destroy => destroy(&cli).await,
        Commands::Status => show_status(&cli).await,
        Commands::Ping => ping(&cli).await,
        Commands::Init => init_config(&cli).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Create or update every declared resource
async fn apply(cli: &Cli) -> Result<()> {
    info!("Applying resource definitions...");

    let definitions =
        DefinitionsFile::from_file(&cli.config).context("Failed to load definitions")?;
    let client = kapacitor::configure(&definitions.provider).await?;
    let mut state = State::load(&cli.state).await?;

    let mut declared = HashSet::new();

    for mut cluster in definitions.clusters {
        declared.insert(cluster.key());
        apply_resource(&mut cluster, &client, &mut state, &cli.state).await?;
    }

    for mut rule in definitions.firewall_rules {
        declared.insert(rule.key());
        apply_resource(&mut rule, &client, &mut state, &cli.state).await?;
    }

    // Anything still tracked is no longer declared
    for (key, id) in state.entries() {
        if declared.contains(&key) {
            continue;
        }
        info!("{} is no longer declared", key);
        delete_tracked_task(&client, &key, &id).await?;
        state.set_task_id(&key, None);
        state.save(&cli.state).await?;
    }

    info!("✓ Apply completed successfully");

    Ok(())
}

/// Converge a single resource and record its task id
async fn apply_resource<R: TaskResource, C: TaskApi>(
    resource: &mut R,
    client: &C,
    state: &mut State,
    state_path: &Path,
) -> Result<()> {
    let key = resource.key();
    info!("Applying {}: {}", key, resource.summary());
    resource.data_mut().id = state.task_id(&key);

    let result = lifecycle::apply(resource, client).await;

    // A task created before a failed read-back must stay tracked.
    state.set_task_id(&key, resource.data().id.clone());
    state.save(state_path).await?;

    let outcome = result.with_context(|| format!("Failed to apply {}", key))?;

    info!(
        "{}: {} (task: {})",
        key,
        outcome,
        resource.data().id.as_deref().unwrap_or("none")
    );

    Ok(())
}

/// Delete a task that is only known from state, tolerating it being gone
async fn delete_tracked_task<C: TaskApi>(client: &C, key: &str, id: &str) -> Result<()> {
    if client.read_task(id).await?.is_none() {
        info!("Task {} for {} already gone", id, key);
        return Ok(());
    }

    client
        .delete_task(id)
        .await
        .with_context(|| format!("Failed to delete task {} for {}", id, key))?;
    info!("Deleted task {} for {}", id, key);

    Ok(())
}

/// Delete every tracked resource
async fn destroy(cli: &Cli) -> Result<()> {
    info!("Destroying tracked resources...");

    let definitions =
        DefinitionsFile::from_file(&cli.config).context("Failed to load definitions")?;
    let client = kapacitor::configure(&definitions.provider).await?;
    let mut state = State::load(&cli.state).await?;

    if state.is_empty() {
        info!("No tracked resources, nothing to destroy");
        return Ok(());
    }

    for mut cluster in definitions.clusters {
        destroy_resource(&mut cluster, &client, &mut state, &cli.state).await?;
    }

    for mut rule in definitions.firewall_rules {
        destroy_resource(&mut rule, &client, &mut state, &cli.state).await?;
    }

    for (key, id) in state.entries() {
        delete_tracked_task(&client, &key, &id).await?;
        state.set_task_id(&key, None);
        state.save(&cli.state).await?;
    }

    info!("✓ Resources destroyed successfully");

    Ok(())
}

async fn destroy_resource<R: TaskResource, C: TaskApi>(
    resource: &mut R,
    client: &C,
    state: &mut State,
    state_path: &Path,
) -> Result<()> {
    let key = resource.key();
    let Some(id) = state.task_id(&key) else {
        return Ok(());
    };
    resource.data_mut().id = Some(id);

    lifecycle::read(resource, client).await?;
    if resource.data().id.is_some() {
        lifecycle::delete(resource, client)
            .await
            .with_context(|| format!("Failed to destroy {}", key))?;
        info!("Destroyed {}", key);
    } else {
        info!("{} was already gone", key);
    }

    state.set_task_id(&key, None);
    state.save(state_path).await
}

/// Show tracked resources
async fn show_status(cli: &Cli) -> Result<()> {
    let definitions =
        DefinitionsFile::from_file(&cli.config).context("Failed to load definitions")?;
    let client = kapacitor::configure(&definitions.provider).await?;
    let state = State::load(&cli.state).await?;

    let declared: Vec<String> = definitions
        .clusters
        .iter()
        .map(|c| c.key())
        .chain(definitions.firewall_rules.iter().map(|r| r.key()))
        .collect();

    let entries = state.entries();
    let tasks = join_all(entries.iter().map(|(_, id)| client.read_task(id))).await;

    info!("Resources:");
    for key in declared.iter().filter(|k| state.task_id(k).is_none()) {
        info!("  - {} (not created)", key);
    }
    for ((key, id), task) in entries.iter().zip(tasks) {
        let declared_note = if declared.contains(key) {
            ""
        } else {
            " [no longer declared]"
        };

        match task {
            Ok(Some(task)) if !task.error.is_empty() => {
                warn!("  - {} (task: {}, error: {}){}", key, task.id, task.error, declared_note)
            }
            Ok(Some(task)) => {
                let dbrps: Vec<QualifiedIdentifier> = task.dbrps.iter().map(Into::into).collect();
                info!(
                    "  - {} (task: {}, type: {}, status: {}, executing: {}, dbrps: {}){}",
                    key,
                    task.id,
                    task.task_type,
                    task.status,
                    task.executing,
                    identifier::serialize(&dbrps).join(", "),
                    declared_note
                )
            }
            Ok(None) => warn!("  - {} (task {} no longer exists){}", key, id, declared_note),
            Err(e) => warn!("  - {} (task {}: {:#})", key, id, e),
        }
    }

    Ok(())
}

/// Check connectivity to the configured server
async fn ping(cli: &Cli) -> Result<()> {
    let definitions =
        DefinitionsFile::from_file(&cli.config).context("Failed to load definitions")?;
    kapacitor::configure(&definitions.provider).await?;

    info!("✓ Kapacitor is reachable");

    Ok(())
}

/// Initialize example definitions file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Definitions file already exists: {}",
            cli.config.display()
        );
    }

    let example = DefinitionsFile::example();
    let yaml = serde_yaml::to_string(&example)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write definitions file")?;

    info!("Example definitions created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Point provider.url at your Kapacitor server");
    info!("  2. Set credentials if the server requires them:");
    info!("     export KAPACITOR_PASSWORD=your-password");
    info!("  3. Apply the definitions:");
    info!("     kapacitor-provider apply");

    Ok(())
}
