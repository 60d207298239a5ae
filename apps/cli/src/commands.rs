//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use mcserver_core::{DirectoryConfigSource, MachineConfigServer, Server};
use mcserver_shared::{AppConfig, PoolRequest, init_config, load_config, load_config_from};
use tracing::info;

use crate::http::{self, AppState};
use crate::metrics::ServerMetrics;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// machine-config-server: first-boot Ignition for new cluster nodes.
#[derive(Parser)]
#[command(
    name = "machine-config-server",
    version,
    about = "Serve first-boot Ignition documents assembled from MachineConfigs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.mcserver/mcserver.toml.
    #[arg(long, global = true, env = "MCSERVER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Overrides for where machine configs and credentials are read from.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Directory holding one `<pool>.json` MachineConfig per pool.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Serving kubeconfig handed to new nodes.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Root CA bundle for the control plane.
    #[arg(long)]
    pub root_ca: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Render the provisioning document for one pool.
    Render {
        /// Machine config pool to render (e.g. worker).
        #[arg(short, long)]
        pool: String,

        /// Write the document here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Serve provisioning documents over HTTP.
    Serve {
        /// Address for the config endpoint.
        #[arg(long)]
        bind: Option<String>,

        /// Address for the metrics listener.
        #[arg(long)]
        metrics_bind: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mcserver=info",
        1 => "mcserver=debug",
        _ => "mcserver=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `render` output on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Render { pool, out, source } => {
            cmd_render(apply_overrides(config, &source), &pool, out.as_deref())
        }
        Command::Serve {
            bind,
            metrics_bind,
            source,
        } => {
            let mut config = apply_overrides(config, &source);
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(bind) = metrics_bind {
                config.metrics.bind_address = bind;
            }
            cmd_serve(config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Layer CLI flags over the loaded config.
fn apply_overrides(mut config: AppConfig, source: &SourceArgs) -> AppConfig {
    if let Some(dir) = &source.config_dir {
        config.server.config_dir = dir.clone();
    }
    if let Some(path) = &source.kubeconfig {
        config.kubeconfig.path = path.clone();
    }
    if let Some(path) = &source.root_ca {
        config.kubeconfig.root_ca_path = path.clone();
    }
    config
}

fn build_server(config: &AppConfig) -> MachineConfigServer<DirectoryConfigSource> {
    MachineConfigServer::new(DirectoryConfigSource::from_config(config))
}

fn cmd_render(config: AppConfig, pool: &str, out: Option<&Path>) -> Result<()> {
    let server = build_server(&config);
    let doc = server
        .get_config(&PoolRequest::new(pool))
        .wrap_err_with(|| format!("could not render pool '{pool}'"))?;

    match out {
        Some(path) => {
            std::fs::write(path, doc.as_bytes())
                .wrap_err_with(|| format!("could not write {}", path.display()))?;
            info!(pool, path = %path.display(), size = doc.len(), "wrote provisioning document");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(doc.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    let metrics = Arc::new(ServerMetrics::new());
    let state = AppState {
        server: Arc::new(build_server(&config)),
        metrics: Arc::clone(&metrics),
    };

    let metrics_addr = config.metrics.resolved_bind_address().to_string();
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .wrap_err_with(|| format!("unable to start metrics listener on {metrics_addr}"))?;
    info!(addr = %metrics_addr, "starting metrics listener");

    let metrics_task = tokio::spawn(async move {
        axum::serve(metrics_listener, http::metrics_router(metrics)).await
    });

    let addr = &config.server.bind_address;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("unable to bind config endpoint on {addr}"))?;
    info!(
        %addr,
        config_dir = %config.server.config_dir.display(),
        "serving machine configs"
    );

    let config_endpoint = async { axum::serve(listener, http::config_router(state)).await };

    tokio::select! {
        served = config_endpoint => {
            served.wrap_err("config endpoint stopped")?;
        }
        stopped = metrics_task => {
            stopped?.wrap_err("metrics listener stopped")?;
            return Err(eyre!("metrics listener exited unexpectedly"));
        }
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
