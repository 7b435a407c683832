use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use semver::Version;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use schemashift::config::{Config, LogFormat};
use schemashift::migrations::progress::{JsonLinesProgress, LogProgress, ProgressObserver};
use schemashift::migrations::runner::{RunReport, Runner, StepOutcome};
use schemashift::migrations::{all_plans, StepState};
use schemashift::services::inventory;
use schemashift::services::storage::SeaStorage;
use schemashift::services::updater::Updater;

#[derive(Parser)]
#[command(name = "schemashift")]
#[command(author, version, about = "Versioned schema and data updates for legacy member-group installs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered update versions and their steps
    Plans,
    /// Show which steps of an update are already in place
    Status {
        #[arg(long)]
        version: Version,
    },
    /// Run one update plan
    Run {
        #[arg(long)]
        version: Version,
        #[arg(long, value_enum, default_value_t = ProgressMode::Log)]
        progress: ProgressMode,
    },
    /// Run every update plan after FROM up to and including TO
    Upgrade {
        #[arg(long)]
        from: Version,
        #[arg(long)]
        to: Version,
        #[arg(long, value_enum, default_value_t = ProgressMode::Log)]
        progress: ProgressMode,
    },
    /// Count roles, permissions and config rows after the 6.0.0 update
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// Log each step transition
    Log,
    /// One JSON object per step transition on stdout
    Json,
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("schemashift={}", config.log_level).into());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn observer(mode: ProgressMode) -> Box<dyn ProgressObserver> {
    match mode {
        ProgressMode::Log => Box::new(LogProgress),
        ProgressMode::Json => Box::new(JsonLinesProgress),
    }
}

fn print_report(report: &RunReport) {
    for step in &report.steps {
        let outcome = match step.outcome {
            StepOutcome::Applied => "applied",
            StepOutcome::AlreadyApplied => "already applied",
        };
        eprintln!(
            "  {:>2}. {:<45} {} ({} ms)",
            step.index,
            step.name,
            outcome,
            step.elapsed.as_millis()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config);

    if let Commands::Plans = cli.command {
        for plan in all_plans() {
            println!("{}", plan.version);
            for (position, name) in plan.step_names().iter().enumerate() {
                println!("  {:>2}. {}", position + 1, name);
            }
        }
        return Ok(());
    }

    let db = schemashift::db::connect(&config).await?;

    if let Commands::Summary = cli.command {
        let summary = inventory::summarize(&db).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let storage = SeaStorage::new(db);
    let mode = match &cli.command {
        Commands::Run { progress, .. } | Commands::Upgrade { progress, .. } => *progress,
        _ => ProgressMode::Log,
    };
    let progress = observer(mode);
    let updater = Updater::new(Runner::new(&storage, &config.install, progress.as_ref()));

    match cli.command {
        Commands::Status { version } => {
            for step in updater.status(&version).await? {
                match step.state {
                    StepState::Partial(why) => {
                        println!("{:>2}. {:<45} partial: {}", step.index, step.name, why)
                    }
                    state => println!("{:>2}. {:<45} {}", step.index, step.name, state.label()),
                }
            }
        }
        Commands::Run { version, .. } => {
            let report = updater.run_version(&version).await?;
            print_report(&report);
        }
        Commands::Upgrade { from, to, .. } => {
            for report in updater.upgrade(&from, &to).await? {
                eprintln!("{}", report.version);
                print_report(&report);
            }
        }
        Commands::Plans | Commands::Summary => {}
    }

    Ok(())
}
