//! `healthctl` – run health probes from the command line or serve them to
//! orchestration tooling over a Unix socket.
//!
//! Exit codes: 0 Healthy/Degraded, 1 Unhealthy, 2 startup or usage error.

mod config;
mod logging;
mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};
use health_engine::manifest::Capabilities;
use health_engine::platform::{ReqwestNetwork, StdFilesystem};
use health_engine::service::{LIVE_TAG, READY_TAG};
use health_engine::types::as_millis_f64;
use health_engine::{AggregatedReport, HealthResponse, HealthService, HealthStatus, TagFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "healthctl",
    version,
    about = "Run tag-filtered health probes and report an aggregated status"
)]
struct Cli {
    /// Extra configuration file layered over the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run probes selected by tag and print the aggregated report.
    Check {
        /// Select probes carrying this tag (repeatable; any match selects).
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// Require every given tag instead of any.
        #[arg(long, requires = "tags")]
        all_tags: bool,
        /// Run every registered probe.
        #[arg(long, conflicts_with = "tags")]
        all: bool,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Liveness view: probes tagged `live`.
    Live {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Readiness view: probes tagged `ready`.
    Ready {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List registered probes and their tags.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start daemon mode over a Unix socket.
    Serve {
        /// Path for the Unix domain socket.
        #[arg(long)]
        socket: PathBuf,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output as JSON.
    #[arg(long)]
    json: bool,
    /// Include error details and probe data in JSON output.
    #[arg(long)]
    detailed: bool,
    /// Per-probe timeout (e.g. "2s", "500ms"); defaults to the config value.
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,
}

// ===========================================================================
// Main
// ===========================================================================

/// How long blocking probe work abandoned after a timeout may hold up exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let cli = Cli::parse();
    match block_on_runtime(run(cli)) {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Drive `fut` on a fresh multi-threaded runtime, then shut it down without
/// waiting on blocking tasks still stuck in timed-out probes.
fn block_on_runtime<F: std::future::Future>(fut: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(fut);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init_logging(&config.logging);

    let caps = Capabilities {
        fs: Arc::new(StdFilesystem),
        network: Arc::new(ReqwestNetwork::new()?),
    };
    let registry = config
        .manifest()
        .build_registry(&caps)
        .context("invalid probe configuration")?;
    tracing::debug!(probes = registry.len(), "registry built");

    let service = HealthService::new(registry).with_default_timeout(config.default_timeout());

    match cli.command {
        Commands::Check {
            tags,
            all_tags,
            all,
            output,
        } => {
            let filter = check_filter(tags, all_tags, all);
            Ok(cmd_check(&service, &filter, &output).await)
        }
        Commands::Live { output } => {
            Ok(cmd_check(&service, &TagFilter::tag(LIVE_TAG), &output).await)
        }
        Commands::Ready { output } => {
            Ok(cmd_check(&service, &TagFilter::tag(READY_TAG), &output).await)
        }
        Commands::List { json } => {
            cmd_list(&service, json);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve { socket } => {
            serve::run_daemon(socket, service).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

fn check_filter(tags: Vec<String>, all_tags: bool, all: bool) -> TagFilter {
    if all || tags.is_empty() {
        TagFilter::All
    } else if all_tags {
        TagFilter::AllOf(tags)
    } else {
        TagFilter::AnyOf(tags)
    }
}

async fn cmd_check(service: &HealthService, filter: &TagFilter, output: &OutputArgs) -> ExitCode {
    let service = match output.timeout {
        Some(t) => service.clone().with_default_timeout(t),
        None => service.clone(),
    };
    let report = service.query_filter(filter).await;

    if output.json {
        let body = if output.detailed {
            HealthResponse::detailed(&report)
        } else {
            HealthResponse::from(&report)
        };
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        print_human(filter, &report);
    }

    exit_code(report.overall_status)
}

fn cmd_list(service: &HealthService, json: bool) {
    let probes = service.registry().list();
    if json {
        let v: Vec<_> = probes
            .iter()
            .map(|(name, tags)| serde_json::json!({ "name": name, "tags": tags }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default());
        return;
    }
    for (name, tags) in probes {
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        println!("{:<24} [{}]", name, tags.join(", "));
    }
}

// ===========================================================================
// Output helpers
// ===========================================================================

fn exit_code(status: HealthStatus) -> ExitCode {
    ExitCode::from(exit_status(status))
}

fn exit_status(status: HealthStatus) -> u8 {
    if status.is_available() {
        0
    } else {
        1
    }
}

fn print_human(filter: &TagFilter, r: &AggregatedReport) {
    println!(
        "[{}] {} ({} checks, {:.1}ms)",
        r.overall_status.as_str().to_uppercase(),
        filter,
        r.entries.len(),
        as_millis_f64(r.total_duration)
    );
    for e in &r.entries {
        let description = e.outcome.description.as_deref().unwrap_or("");
        println!(
            "  {:<24} {:<10} {:>8.1}ms  {}",
            e.name,
            e.outcome.status,
            as_millis_f64(e.outcome.duration),
            description
        );
    }
}

/// Parse "1500ms", "2s", "1m" or a bare number of milliseconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "ms"),
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {:?}", s))?;
    let d = match unit {
        "ms" => Duration::from_millis(n),
        "s" => Duration::from_secs(n),
        "m" => n
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration out of range: {:?}", s))?,
        other => return Err(format!("unknown duration unit {:?} (use ms, s or m)", other)),
    };
    if d.is_zero() {
        return Err("duration must be greater than zero".into());
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("750"), Ok(Duration::from_millis(750)));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("400000000000000000m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_status(HealthStatus::Healthy), 0);
        assert_eq!(exit_status(HealthStatus::Degraded), 0);
        assert_eq!(exit_status(HealthStatus::Unhealthy), 1);
    }

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from([
            "healthctl", "check", "--tag", "db", "-t", "sql", "--all-tags", "--json", "--timeout", "2s",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                tags,
                all_tags,
                all,
                output,
            } => {
                assert_eq!(tags, vec!["db", "sql"]);
                assert!(all_tags);
                assert!(!all);
                assert!(output.json);
                assert_eq!(output.timeout, Some(Duration::from_secs(2)));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_check_all_flag() {
        let cli = Cli::try_parse_from(["healthctl", "check", "--all"]).unwrap();
        match cli.command {
            Commands::Check {
                tags,
                all_tags,
                all,
                ..
            } => {
                assert!(all);
                assert_eq!(check_filter(tags, all_tags, all), TagFilter::All);
            }
            _ => panic!("expected check"),
        }

        assert!(Cli::try_parse_from(["healthctl", "check", "--all", "--tag", "db"]).is_err());
        assert!(Cli::try_parse_from(["healthctl", "check", "--all-tags"]).is_err());
    }

    #[test]
    fn test_check_filter_from_tags() {
        let tags = || vec!["db".to_string(), "sql".to_string()];
        assert_eq!(check_filter(vec![], false, false), TagFilter::All);
        assert_eq!(check_filter(tags(), false, false), TagFilter::AnyOf(tags()));
        assert_eq!(check_filter(tags(), true, false), TagFilter::AllOf(tags()));
    }

    #[test]
    fn test_runtime_exit_does_not_wait_for_stuck_blocking_work() {
        let start = std::time::Instant::now();
        let timed_out = block_on_runtime(async {
            let stuck = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            tokio::time::timeout(Duration::from_millis(50), stuck)
                .await
                .is_err()
        })
        .unwrap();
        assert!(timed_out);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
