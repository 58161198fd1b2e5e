//! AgeGate command-line harness.
//!
//! Runs the verification pipeline against a simulated camera and synthetic age
//! scorer, with verdicts stored in an LMDB environment under `--data-dir`.

mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use agegate_capture::{SimulatedCamera, SyntheticScorer};
use agegate_store_lmdb::LmdbEnvironment;
use agegate_types::{SubjectId, SystemClock, Timestamp};
use agegate_utils::{format_remaining, init_logging, init_tracing, LogFormat};
use agegate_verification::{
    ChannelSink, Collaborators, NoopSink, VerificationConfig, VerificationOrchestrator,
};
use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "agegate", about = "On-device age verification harness")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; flags
    /// and env vars override them.
    #[arg(long, env = "AGEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the verdict store.
    #[arg(long, default_value = "./agegate_data", env = "AGEGATE_DATA_DIR")]
    data_dir: PathBuf,

    /// Who is being verified. Each subject has its own cached verdict.
    #[arg(long, default_value = "local", env = "AGEGATE_SUBJECT")]
    subject: String,

    /// Minimum age that passes the facial check.
    #[arg(long, env = "AGEGATE_MINIMUM_AGE")]
    minimum_age: Option<u32>,

    /// Days a passed verdict stays valid.
    #[arg(long, env = "AGEGATE_CACHE_TTL_DAYS")]
    cache_ttl_days: Option<u32>,

    /// Seconds allowed per challenge question.
    #[arg(long, env = "AGEGATE_QUESTION_TIMEOUT")]
    question_timeout: Option<f64>,

    /// Log level: "trace", "debug", "info", "warn", "error". Without it,
    /// `RUST_LOG` applies and falls back to warnings only.
    #[arg(long, env = "AGEGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "AGEGATE_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a verification, answering challenge questions on stdin.
    Verify {
        /// Age the synthetic scorer reports, before jitter.
        #[arg(long, default_value_t = 25, env = "AGEGATE_SIMULATED_AGE")]
        simulated_age: u32,

        /// Maximum deviation of each synthetic sample from the simulated age.
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(..=100))]
        jitter: u32,

        /// Seed for reproducible synthetic samples.
        #[arg(long)]
        seed: Option<u64>,

        /// Simulated camera warm-up in milliseconds.
        #[arg(long, default_value_t = 500)]
        warm_up_ms: u64,
    },
    /// Show whether the subject holds a valid verdict.
    Status,
    /// Delete the subject's verdict so the next run verifies from scratch.
    Reset,
    /// Print the effective configuration as TOML.
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<VerificationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = VerificationConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => VerificationConfig::default(),
    };
    if let Some(age) = cli.minimum_age {
        config.minimum_age = age;
    }
    if let Some(days) = cli.cache_ttl_days {
        config.cache_ttl_days = days;
    }
    if let Some(secs) = cli.question_timeout {
        config.challenge.question_timeout_secs = secs;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_store(data_dir: &Path) -> anyhow::Result<LmdbEnvironment> {
    LmdbEnvironment::open_default(data_dir)
        .with_context(|| format!("opening verdict store in {}", data_dir.display()))
}

/// An orchestrator for commands that only inspect or clear the verdict.
fn offline_orchestrator(
    subject: SubjectId,
    config: VerificationConfig,
    env: &LmdbEnvironment,
) -> VerificationOrchestrator {
    let (parts, _answers) = Collaborators::standard(
        &config,
        Arc::new(SimulatedCamera::new(Duration::ZERO)),
        Arc::new(SyntheticScorer::new(0, 0, 0.0, 0.0)),
        Arc::new(env.kv_store()),
        Arc::new(SystemClock),
        Arc::new(NoopSink),
    );
    VerificationOrchestrator::new(subject, config, parts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match (cli.log_level.as_deref(), cli.log_format) {
        (None, LogFormat::Human) => init_tracing(),
        (level, format) => init_logging(format, level.unwrap_or("info")),
    }

    let config = load_config(&cli)?;
    let subject = SubjectId::new(cli.subject.as_str())?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Status => {
            let env = open_store(&cli.data_dir)?;
            let orch = offline_orchestrator(subject, config, &env);
            match orch.cached_verdict() {
                Some(verdict) if orch.is_verified() => {
                    let remaining = verdict.expires_at.secs_until(Timestamp::now());
                    println!(
                        "{}: verified, {} ({} days until re-verification)",
                        orch.subject(),
                        format_remaining(remaining),
                        orch.days_until_reverification()
                    );
                }
                Some(_) => println!("{}: verdict expired, verification required", orch.subject()),
                None => println!("{}: not verified", orch.subject()),
            }
        }
        Command::Reset => {
            let env = open_store(&cli.data_dir)?;
            let orch = offline_orchestrator(subject, config, &env);
            orch.force_reverification()?;
            println!("{}: verdict cleared", orch.subject());
        }
        Command::Verify {
            simulated_age,
            jitter,
            seed,
            warm_up_ms,
        } => {
            let env = open_store(&cli.data_dir)?;
            let scorer = match seed {
                Some(seed) => SyntheticScorer::seeded(simulated_age, jitter, 0.6, 0.98, seed),
                None => SyntheticScorer::new(simulated_age, jitter, 0.6, 0.98),
            };
            let (sink, events) = ChannelSink::channel();
            let (parts, answers) = Collaborators::standard(
                &config,
                Arc::new(SimulatedCamera::new(Duration::from_millis(warm_up_ms))),
                Arc::new(scorer),
                Arc::new(env.kv_store()),
                Arc::new(SystemClock),
                Arc::new(sink),
            );
            let orch = Arc::new(VerificationOrchestrator::new(subject, config, parts));

            tracing::info!(subject = %orch.subject(), "starting verification");
            let front_end = tokio::spawn(console::run(events, answers));

            let mut run = {
                let orch = orch.clone();
                tokio::spawn(async move { orch.start_verification().await })
            };
            let joined = tokio::select! {
                joined = &mut run => joined,
                _ = tokio::signal::ctrl_c() => {
                    if !orch.stop_capture() {
                        run.abort();
                        anyhow::bail!("interrupted");
                    }
                    println!("Stopping capture; press Ctrl-C again to abort.");
                    tokio::select! {
                        joined = &mut run => joined,
                        _ = tokio::signal::ctrl_c() => {
                            run.abort();
                            anyhow::bail!("interrupted");
                        }
                    }
                }
            };
            let result = joined.context("verification task panicked")?;
            front_end.await.context("console task panicked")?;

            let stats = orch.stats();
            tracing::debug!(?stats, "verification stats");
            if let Err(e) = result {
                anyhow::bail!("verification failed: {e}");
            }
        }
    }

    Ok(())
}
