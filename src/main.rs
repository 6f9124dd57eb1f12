use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use txnsentinel::config::{LoggingConfig, SentinelConfig};
use txnsentinel::detect::{self, EntityVerdict, MonitoringWindow};
use txnsentinel::source::{self, MonitoringSource};

#[derive(Parser)]
#[command(
    name = "txnsentinel",
    about = "Transaction anomaly monitoring for payment-gateway dashboards",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $TXNSENTINEL_CONFIG, then /etc/txnsentinel/txnsentinel.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (poller + API server)
    Serve {
        /// Bind address, overrides [server].bind
        #[arg(long)]
        bind: Option<String>,
    },

    /// Evaluate a saved monitoring response
    Evaluate {
        /// JSON file with `{ "data": [...] }` or a bare series array; `-` for stdin
        #[arg(long, short)]
        input: PathBuf,

        /// Monitoring window the data was fetched for (interval8h or hourly48h)
        #[arg(long, default_value = "interval8h")]
        window: MonitoringWindow,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Only print abnormal entities
        #[arg(long)]
        abnormal_only: bool,
    },

    /// Fetch once from the configured source and evaluate
    Poll {
        /// Window to poll; defaults to every configured window
        #[arg(long)]
        window: Option<MonitoringWindow>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective policy table
    Policy,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read series from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
}

fn print_verdicts(window: MonitoringWindow, verdicts: &[EntityVerdict], abnormal_only: bool) {
    let abnormal = verdicts.iter().filter(|v| !v.is_normal).count();
    println!("\n=== Transaction Monitoring ({}) ===", window);
    println!("{:<28} | {:<14} | {:<8} | Reasons", "Merchant", "Method", "Status");
    println!("{:-<28}-|-{:-<14}-|-{:-<8}-|-{:-<40}", "", "", "", "");
    for v in verdicts {
        if abnormal_only && v.is_normal {
            continue;
        }
        let merchant = if v.merchant_name.is_empty() {
            &v.key.merchant
        } else {
            &v.merchant_name
        };
        let status = if v.is_normal { "OK" } else { "ABNORMAL" };
        let mut reasons = v.reasons.iter();
        let first = reasons.next().map(|(_, r)| r).unwrap_or("");
        println!(
            "{:<28} | {:<14} | {:<8} | {}",
            merchant, v.key.payment_method, status, first
        );
        for (_, reason) in reasons {
            println!("{:<28} | {:<14} | {:<8} | {}", "", "", "", reason);
        }
    }
    println!("\n{} entities, {} abnormal\n", verdicts.len(), abnormal);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SentinelConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);
    tracing::debug!(config = ?cli.config, "configuration resolved");

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            tracing::info!(%bind, "Starting txnsentinel daemon");
            txnsentinel::serve(&bind, config).await?;
        }
        Commands::Evaluate {
            input,
            window,
            json,
            abnormal_only,
        } => {
            let body = read_input(&input)?;
            let series = source::parse_series(&body)
                .with_context(|| format!("failed to parse series from {}", input.display()))?;
            let verdicts = detect::evaluate(&series, &config.policy.for_window(window));
            tracing::info!(%window, entities = verdicts.len(), "evaluated saved series");

            if json {
                let out: Vec<_> = verdicts
                    .into_iter()
                    .filter(|v| !abnormal_only || !v.is_normal)
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_verdicts(window, &verdicts, abnormal_only);
            }
        }
        Commands::Poll { window, json } => {
            let source = txnsentinel::http_source(&config)?;
            let windows = match window {
                Some(w) => vec![w],
                None => config.polling.windows.clone(),
            };
            for window in windows {
                let series = source
                    .fetch(window, chrono::Utc::now())
                    .await
                    .with_context(|| format!("failed to fetch {} monitoring data", window))?;
                let verdicts = detect::evaluate(&series, &config.policy.for_window(window));
                if json {
                    println!("{}", serde_json::to_string_pretty(&verdicts)?);
                } else {
                    print_verdicts(window, &verdicts, false);
                }
            }
        }
        Commands::Policy => {
            println!("{}", toml::to_string_pretty(&config.policy)?);
        }
    }

    Ok(())
}
