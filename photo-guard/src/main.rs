#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use photo_guard_lib::config::{load_from_path, Config};
use photo_guard_lib::security::anonymize::{AnonymizeOptions, DataAnonymizer, DataType};
use photo_guard_lib::security::ip_filter::{AccessContext, IpFilter};
use photo_guard_lib::security::rate_limit::{CheckOptions, ClientIdentifier, RateLimitManager};
use photo_guard_lib::security::{SecurityEventSink, TracingEventSink};
use photo_guard_lib::telemetry::{encode_metrics, init_metrics, init_tracing, Metrics};
use photo_guard_lib::{spawn_cleanup_task, Clock, Maintenance, SystemClock};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Client-side security controls for photo migration")]
struct Cli {
    /// Path to configuration TOML file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", env = "PHOTO_GUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate an IP address against the filter
    CheckIp {
        ip: String,
        /// ISO country code resolved for the address
        #[arg(long)]
        country: Option<String>,
    },
    /// Run repeated rate limit checks for one client
    RateLimit {
        ip: String,
        endpoint: String,
        #[arg(long)]
        user: Option<String>,
        /// Number of consecutive requests
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Anonymize a value (JSON or plain text) as the given data type
    Anonymize { data_type: String, value: String },
    /// Scrub emails, paths and user names from free text
    Scrub {
        text: String,
        /// Treat the text as a stack trace
        #[arg(long)]
        stack: bool,
    },
    /// Build all engines and run periodic cleanup until Ctrl-C
    Run {
        /// Print Prometheus metrics on shutdown
        #[arg(long)]
        metrics: bool,
    },
}

struct Engines {
    filter: Arc<IpFilter>,
    limiter: Arc<RateLimitManager>,
    anonymizer: Arc<DataAnonymizer>,
}

fn build_engines(cfg: &Config, metrics: Option<Arc<Metrics>>) -> photo_guard_lib::Result<Engines> {
    let sink: Arc<dyn SecurityEventSink> = Arc::new(TracingEventSink);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut filter = IpFilter::new(&cfg.ip_security, sink.clone(), clock.clone())?;
    let mut limiter = RateLimitManager::new(&cfg.rate_limit, sink.clone(), clock.clone())?;
    let mut anonymizer = DataAnonymizer::new(&cfg.anonymization, sink, clock)?;
    if let Some(m) = metrics {
        filter = filter.with_metrics(m.clone());
        limiter = limiter.with_metrics(m.clone());
        anonymizer = anonymizer.with_metrics(m);
    }

    Ok(Engines {
        filter: Arc::new(filter),
        limiter: Arc::new(limiter),
        anonymizer: Arc::new(anonymizer),
    })
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(err) => error!(%err, "failed to render output"),
    }
}

async fn run(cli: Cli, cfg: Config) -> photo_guard_lib::Result<()> {
    let telemetry = match cli.command {
        Command::Run { metrics: true } => Some(init_metrics()?),
        _ => None,
    };
    let engines = build_engines(&cfg, telemetry.as_ref().map(|(m, _)| m.clone()))?;

    match cli.command {
        Command::CheckIp { ip, country } => {
            let context = AccessContext { country, ..AccessContext::default() };
            let decision = engines.filter.is_ip_allowed(&ip, &context);
            print_json(&serde_json::to_value(&decision)?);
        }
        Command::RateLimit { ip, endpoint, user, count } => {
            let mut identifier = ClientIdentifier::new(ip);
            identifier.user_id = user;
            if engines.limiter.apply_whitelist(&identifier) {
                print_json(&json!({ "whitelisted": true }));
                return Ok(());
            }
            for _ in 0..count {
                let outcome = engines.limiter.check_rate_limit(
                    &identifier,
                    &endpoint,
                    &CheckOptions::default(),
                );
                print_json(&json!({
                    "allowed": outcome.allowed(),
                    "scope": outcome.scope.as_str(),
                    "limit": outcome.limit(),
                    "remaining": outcome.remaining(),
                    "reset_time": outcome.reset_time_ms,
                    "retry_after": outcome.result.retry_after_secs(),
                    "risk": outcome.risk,
                }));
            }
        }
        Command::Anonymize { data_type, value } => {
            let data_type: DataType = match data_type.parse() {
                Ok(data_type) => data_type,
                Err(never) => match never {},
            };
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let anonymized =
                engines.anonymizer.anonymize_data(&value, &data_type, &AnonymizeOptions::default());
            print_json(&anonymized);
        }
        Command::Scrub { text, stack } => {
            let scrubbed = if stack {
                engines.anonymizer.scrub_stack_trace(&text)
            } else {
                engines.anonymizer.scrub_error_message(&text)
            };
            println!("{scrubbed}");
        }
        Command::Run { .. } => {
            if let Some(url) = &cfg.ip_security.remote_rules_url {
                engines.filter.sync_remote_rules(url).await;
            }

            let shutdown = CancellationToken::new();
            let targets: Vec<Arc<dyn Maintenance>> =
                vec![engines.filter.clone(), engines.limiter.clone(), engines.anonymizer.clone()];
            let interval = Duration::from_secs(cfg.maintenance.cleanup_interval_secs);
            let cleanup = spawn_cleanup_task(targets, interval, shutdown.clone());

            info!(stats = ?engines.filter.stats(), "security engines running");
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");

            shutdown.cancel();
            engines.limiter.shutdown();
            if let Err(err) = cleanup.await {
                error!(%err, "cleanup task failed");
            }
            if let Some((_, registry)) = &telemetry {
                print!("{}", encode_metrics(registry)?);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => match load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Err(err) = init_tracing(&cfg.logging) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli, cfg).await {
        error!(%err, "photo-guard exited with error");
        std::process::exit(1);
    }
}
