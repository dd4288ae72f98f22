use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use testpulse::analysis::stats::StatsService;
use testpulse::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(
    name = "testpulse",
    about = "Analytics aggregation engine for test-automation dashboards",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (JSON API + background refresh)
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Fetch once and print dashboard statistics
    Stats {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Fetch once and print the most recent executions
    Activity {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let resolved = Config::resolve(cli.config.as_deref())?;
    init_tracing(&resolved.config.logging);
    resolved.log();
    let mut config = resolved.config;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting testpulse daemon");
            testpulse::serve(config).await?;
        }
        Commands::Stats { json } => {
            tracing::info!(upstream = %config.upstream.base_url, "Computing dashboard statistics");
            let service = StatsService::from_config(&config)?;
            let snapshot = service.refresh(chrono::Utc::now()).await;
            let stats = snapshot.stats;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let o = &stats.overview;
                println!("\n=== testpulse Dashboard ===");
                println!("{:<24} : {}", "Projects", o.project_count);
                println!("{:<24} : {}", "Automation projects", o.automation_project_count);
                println!("{:<24} : {}", "Executions", o.execution_count);
                println!("{:<24} : {}", "New projects today", o.today_new_projects);
                println!(
                    "{:<24} : {}% / {}%",
                    "Today pass / fail", o.today_success_rate, o.today_failure_rate
                );
                println!(
                    "{:<24} : {}% / {}%",
                    "Overall pass / fail", o.success_rate, o.failure_rate
                );

                println!("\n{:<8} | {:<8} | Runs", "Day", "Pass %");
                println!("{:-<8}-|-{:-<8}-|-{:-<6}", "", "", "");
                for point in &stats.trend {
                    println!("{:<8} | {:<8} | {}", point.label, point.success_rate, point.total);
                }

                println!("\n{:<32} | Projects", "Package");
                println!("{:-<32}-|-{:-<8}", "", "");
                for bucket in &stats.package_distribution {
                    println!("{:<32} | {}", bucket.name, bucket.count);
                }
                println!();
            }
        }
        Commands::Activity { limit } => {
            let service = StatsService::from_config(&config)?;
            let entries = service.recent_activity(limit).await;

            if entries.is_empty() {
                println!("No executions found.");
            } else {
                println!("{:<28} | {:<16} | {:<7} | Finished", "Run", "Executor", "Status");
                println!("{:-<28}-|-{:-<16}-|-{:-<7}-|-{:-<25}", "", "", "", "");
                for entry in &entries {
                    let finished = entry
                        .ended_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<28} | {:<16} | {:<7} | {}",
                        entry.label.as_deref().unwrap_or("-"),
                        entry.executor.as_deref().unwrap_or("-"),
                        entry.status.to_string(),
                        finished
                    );
                }
            }
        }
    }

    Ok(())
}
