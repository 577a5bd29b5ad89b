//! nvkind Provisioner
//!
//! Creates, reads and deletes GPU-enabled kind clusters. The resource state
//! is kept in a JSON file between invocations.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nvkind_provisioner::{
    resource::with_timeout, AdapterConfig, Collaborators, DockerPatcherConfig, Error,
    KindCliConfig, NvidiaSmiConfig, Orchestrator, OrchestratorConfig, ResourceConfig,
    ResourceState, Result, DEFAULT_CREATE_TIMEOUT, DEFAULT_DELETE_TIMEOUT,
    DEFAULT_UPDATE_TIMEOUT,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// nvkind Provisioner - GPU-enabled local Kubernetes clusters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource state file
    #[arg(long, env = "NVKIND_STATE", default_value = "nvkind-state.json")]
    state: PathBuf,

    /// Resource configuration file (YAML)
    #[arg(long, env = "NVKIND_CONFIG", default_value = "nvkind.yaml")]
    config: PathBuf,

    /// kind executable
    #[arg(long, env = "KIND_BIN", default_value = "kind")]
    kind_bin: PathBuf,

    /// docker executable
    #[arg(long, env = "DOCKER_BIN", default_value = "docker")]
    docker_bin: PathBuf,

    /// nvidia-smi executable
    #[arg(long, env = "NVIDIA_SMI_BIN", default_value = "nvidia-smi")]
    nvidia_smi_bin: PathBuf,

    /// Create timeout in seconds, also used as the readiness wait
    #[arg(long, env = "CREATE_TIMEOUT", default_value_t = DEFAULT_CREATE_TIMEOUT.as_secs())]
    create_timeout_secs: u64,

    /// Delete timeout in seconds
    #[arg(long, env = "DELETE_TIMEOUT", default_value_t = DEFAULT_DELETE_TIMEOUT.as_secs())]
    delete_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the cluster described by the configuration file
    Create,
    /// Refresh kubeconfig and credentials of an existing cluster
    Read,
    /// Delete the cluster recorded in the state file
    Delete,
    /// Print the JSON Schema of the configuration and state
    Schema,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting nvkind provisioner");
    info!("  Version: {}", nvkind_provisioner::VERSION);
    info!("  State file: {}", args.state.display());

    let create_timeout = Duration::from_secs(args.create_timeout_secs);
    let delete_timeout = Duration::from_secs(args.delete_timeout_secs);

    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            create_timeout,
            ..Default::default()
        },
        Collaborators::local(AdapterConfig {
            kind: KindCliConfig {
                binary: args.kind_bin.clone(),
            },
            docker: DockerPatcherConfig {
                binary: args.docker_bin.clone(),
                ..Default::default()
            },
            nvidia_smi: NvidiaSmiConfig {
                binary: args.nvidia_smi_bin.clone(),
            },
            ..Default::default()
        }),
    );

    let (state, operation, result) = match args.command {
        Command::Schema => return print_schema(),
        Command::Create => {
            info!("  Config file: {}", args.config.display());
            if let Some(existing) = ResourceState::load_existing(&args.state)? {
                return Err(Error::Configuration(format!(
                    "cluster {} ({}) is already recorded in {}; delete it first",
                    existing.name,
                    existing.id,
                    args.state.display()
                )));
            }
            let mut state = ResourceState::from_config(ResourceConfig::load(&args.config)?);
            // Create bounds its own phases
            let result = orchestrator.create(&mut state).await;
            (state, "create", result)
        }
        Command::Read => {
            let mut state = ResourceState::load(&args.state)?;
            let result = with_timeout("read", DEFAULT_UPDATE_TIMEOUT, orchestrator.read(&mut state)).await;
            (state, "read", result)
        }
        Command::Delete => {
            let mut state = ResourceState::load(&args.state)?;
            let result = with_timeout("delete", delete_timeout, orchestrator.delete(&mut state)).await;
            (state, "delete", result)
        }
    };

    // Saved even on failure so a running cluster stays recorded
    save_state(&state, &args.state)?;

    match result {
        Ok(()) => {
            info!("Operation {} complete for cluster {}", operation, state.name);
            Ok(())
        }
        Err(e) => {
            error!("Operation {} failed: {}", operation, e);
            error!("  Recovery: {}", e.recovery());
            if e.leaves_cluster_running() || (operation == "create" && state.exists()) {
                warn!("  Cluster {} is still running and only partially patched", state.name);
            }
            Err(e)
        }
    }
}

fn save_state(state: &ResourceState, path: &Path) -> Result<()> {
    state.save(path)?;
    info!("State written to {}", path.display());
    Ok(())
}

fn print_schema() -> Result<()> {
    let schema = serde_json::json!({
        "config": schemars::schema_for!(ResourceConfig),
        "state": schemars::schema_for!(ResourceState),
    });
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["kube=info", "hyper=warn", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
