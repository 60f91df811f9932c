mod app;
mod backend;
mod config_commands;
mod memory_commands;
mod rules_commands;
mod run_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "switchyard", about = "Switchyard: rule-based message dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to discovery in the working and config dirs).
    #[arg(short, long, global = true, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    /// Print collected Prometheus metrics to stderr before exiting.
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true, default_value_t = false)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch messages (default when no subcommand is provided).
    Run(run_commands::RunArgs),
    /// Dispatch rule inspection.
    Rules {
        #[command(subcommand)]
        action: rules_commands::RulesAction,
    },
    /// Registered workflows.
    Workflows {
        #[command(subcommand)]
        action: rules_commands::WorkflowAction,
    },
    /// Conversation memory inspection.
    Memory {
        #[command(subcommand)]
        action: memory_commands::MemoryAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Logs go to stderr so stdout stays clean for replies.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");

    #[cfg(feature = "prometheus")]
    let metrics = switchyard_metrics::init_metrics(switchyard_metrics::MetricsRecorderConfig {
        enabled: cli.print_metrics,
        global_labels: vec![("service".into(), "switchyard".into())],
    })?;

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        None => run_commands::handle_run(run_commands::RunArgs::default(), config_path).await,
        Some(Commands::Run(args)) => run_commands::handle_run(args, config_path).await,
        Some(Commands::Rules { action }) => rules_commands::handle_rules(action, config_path).await,
        Some(Commands::Workflows { action }) => {
            rules_commands::handle_workflows(action, config_path).await
        },
        Some(Commands::Memory { action }) => {
            memory_commands::handle_memory(action, config_path).await
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, config_path),
    };

    #[cfg(feature = "prometheus")]
    if cli.print_metrics {
        eprint!("{}", metrics.render());
    }

    result
}
