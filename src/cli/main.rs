// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Lonkero Probe Engine
 * Standalone CLI for policy-driven active probing
 *
 * Features:
 * - Lists the rule catalogue
 * - Resolves scan policies (YAML, JSON or TOML) into an effective policy
 * - Runs the enabled rules against one or more targets
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use lonkero_probe::alerts::AlertSink;
use lonkero_probe::config::{apply_env_overrides, ConfigLoader, EngineConfig};
use lonkero_probe::http_client::HttpClient;
use lonkero_probe::policy::{resolve, ConfigProgress, EffectivePolicy};
use lonkero_probe::registry::RuleRegistry;
use lonkero_probe::transport::ProbeRequest;
use lonkero_probe::worker::ScanScheduler;

/// Lonkero Probe Engine - policy-driven active scan rules
#[derive(Parser)]
#[command(name = "probe-engine")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Resolve scan policies and run active probe rules.", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - only errors are logged
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Engine configuration file (YAML, JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered rules
    Rules,

    /// Resolve a policy file against the rule catalogue
    Resolve {
        /// Policy file
        #[arg(short, long)]
        policy: PathBuf,
    },

    /// Run the enabled rules against targets
    Scan {
        /// Target URL(s) to scan
        #[arg(required = true)]
        targets: Vec<String>,

        /// Policy file
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Maximum concurrent rule executions
        #[arg(long)]
        concurrency: Option<usize>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,

        /// Write alerts to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.as_str())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("probe-engine")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let registry = Arc::new(RuleRegistry::with_builtin_rules());

    match cli.command {
        Commands::Rules => {
            for descriptor in registry.descriptors() {
                println!(
                    "{:>6}  {:<24} {:<8} {:?}",
                    descriptor.id, descriptor.name, descriptor.risk, descriptor.category
                );
            }
            Ok(())
        }
        Commands::Resolve { policy } => {
            let mut progress = ConfigProgress::new();
            let effective = load_effective_policy(&policy, &registry, &mut progress)?;
            match effective {
                Some(effective) => println!("{}", serde_json::to_string_pretty(&effective)?),
                None => info!("Policy defines nothing, the default policy stays in effect"),
            }
            report_progress(&progress);
            Ok(())
        }
        Commands::Scan {
            targets,
            policy,
            concurrency,
            timeout,
            insecure,
            output,
        } => {
            let config = load_engine_config(cli.config.as_deref())?
                .with_overrides(concurrency, timeout, insecure)
                .context("Invalid command-line settings")?;

            let mut progress = ConfigProgress::new();
            let effective = match &policy {
                Some(path) => load_effective_policy(path, &registry, &mut progress)?,
                None => None,
            };
            report_progress(&progress);
            ensure_policy_usable(&progress)?;

            let bases = targets
                .iter()
                .map(|t| ProbeRequest::get(t).with_context(|| format!("Invalid target: {}", t)))
                .collect::<Result<Vec<_>>>()?;

            let transport = Arc::new(HttpClient::from_config(&config)?);
            let sink = AlertSink::new();
            let scheduler = ScanScheduler::new(Arc::clone(&registry), transport, sink.clone())
                .with_concurrency(config.concurrency);

            let stop = scheduler.stop_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping the scan");
                    stop.stop();
                }
            });

            let summary = scheduler.run(&bases, effective.as_ref()).await;
            info!(
                "{} alerts raised in {} ms",
                summary.alerts_raised, summary.duration_ms
            );

            let json = sink.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write alerts to {:?}", path))?;
                    info!("Alerts written to {:?}", path);
                }
                None => println!("{}", json),
            }
            Ok(())
        }
    }
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => ConfigLoader::new(path)?.load_engine_config(),
        None => {
            let mut config = EngineConfig::default();
            apply_env_overrides(&mut config)?;
            Ok(config)
        }
    }
}

fn load_effective_policy(
    path: &Path,
    registry: &RuleRegistry,
    progress: &mut ConfigProgress,
) -> Result<Option<EffectivePolicy>> {
    let definition = ConfigLoader::new(path)?.load_policy(progress)?;
    Ok(resolve(Some(&definition), &registry.snapshot(), progress))
}

/// A policy with errors may select rules it was meant to exclude
fn ensure_policy_usable(progress: &ConfigProgress) -> Result<()> {
    if progress.has_errors() {
        anyhow::bail!(
            "Policy has {} error(s), refusing to scan",
            progress.errors.len()
        );
    }
    Ok(())
}

fn report_progress(progress: &ConfigProgress) {
    if progress.has_errors() {
        warn!(
            "Policy loaded with {} error(s) and {} warning(s)",
            progress.errors.len(),
            progress.warnings.len()
        );
    } else if progress.has_warnings() {
        warn!("Policy loaded with {} warning(s)", progress.warnings.len());
    }
}
