// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use titan_config::TitanConfig;
use titan_http::{build_app, AppState};
use titan_leader::{run_while_leader, LeaseCoordinator};
use titan_writer::{SingleWriter, WriterConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Minimum retention a trimmed partition must keep regardless of group
/// acknowledgment state (spec §4.7 Retention: "24 h OR until all groups
/// have acked, whichever is later").
const MIN_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const WRITER_CONSUMER_GROUP: &str = "single-writer";

#[derive(Parser, Debug)]
#[command(name = "titan-http", version, about = "Titan-AAS read-optimized REST runtime")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Path to a TOML config file (falls back to defaults plus `TITAN_*` env overrides).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("titan=debug,titan_http=debug,titan_writer=debug,titan_leader=debug")
    } else {
        EnvFilter::new("titan=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = titan_config::load_config(args.config.as_deref())
        .with_context(|| "loading configuration")?;
    let warnings = titan_config::validate_config(&config).with_context(|| "validating configuration")?;
    for warning in warnings {
        warn!(target: "titan.config", %warning, "configuration warning");
    }

    let state = Arc::new(AppState::new(config.clone()));
    let instance_id = Uuid::new_v4().to_string();

    spawn_single_writer(&state, &config, &instance_id);
    spawn_retention_trimmer(&state, &instance_id);

    let app = build_app(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, instance_id = %instance_id, "titan-http listening");

    axum::serve(listener, app).await.context("serve")
}

/// Spawn one background task per Event Log partition, each running the
/// Single-Writer's claim/apply/ack loop in a tight poll (spec §5:
/// "independent pool with concurrency = partition count").
fn spawn_single_writer(state: &Arc<AppState>, config: &TitanConfig, instance_id: &str) {
    let writer_config = WriterConfig {
        batch_size: config.writer_batch_size as usize,
        ..WriterConfig::default()
    };
    let writer = SingleWriter::new(
        state.event_log.clone(),
        state.store.clone(),
        state.cache.clone(),
        state.broadcaster.clone(),
        WRITER_CONSUMER_GROUP,
        instance_id.to_string(),
        writer_config,
    );

    for partition in 0..config.event_log_partitions {
        let writer = writer.clone();
        tokio::spawn(async move {
            loop {
                match writer.process_partition_batch(partition).await {
                    Ok(outcomes) if outcomes.is_empty() => {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(target: "titan.writer", partition, error = %err, "batch read failed, backing off");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        });
    }
}

/// Spawn the leader-elected retention trimmer: only the lease holder trims
/// the Event Log, once per sweep interval, across every partition (spec
/// §4.10, §4.7).
fn spawn_retention_trimmer(state: &Arc<AppState>, instance_id: &str) {
    let event_log = state.event_log.clone();
    let leader: LeaseCoordinator = state.leader.clone();
    let partitions = state.config.event_log_partitions;
    let instance_id = instance_id.to_string();

    tokio::spawn(async move {
        run_while_leader(&leader, "retention-trimmer", &instance_id, RETENTION_SWEEP_INTERVAL, || {
            let event_log = event_log.clone();
            async move {
                for partition in 0..partitions {
                    match event_log.trim(partition, MIN_RETENTION).await {
                        Ok(trimmed) if trimmed > 0 => {
                            info!(target: "titan.leader", partition, trimmed, "trimmed event log partition");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!(target: "titan.leader", partition, error = %err, "retention trim failed");
                        }
                    }
                }
            }
        })
        .await;
    });
}
