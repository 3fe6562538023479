//! roster-notify CLI: operator interface to the notification engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use roster_notify::config::Config;
use roster_notify::config::secrets::ExposeSecret;
use roster_notify::db::Db;
use roster_notify::engine::{EngineConfig, InvocationReport, NotificationEngine, Trigger};
use roster_notify::model::record::Collection;
use roster_notify::store::Document;
use roster_notify::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use roster_notify::transport::{FcmConfig, FcmTransport};

#[derive(Parser)]
#[command(name = "roster-notify", about = "Push notifications for shift rosters and task lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reminder scheduler until Ctrl-C
    Serve,
    /// Run one reminder scan
    Scan {
        /// Scan as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Feed a snapshot pair through change detection and dispatch
    Replay {
        /// Record collection ("shifts" or "tasks")
        #[arg(long)]
        collection: Collection,
        /// Record id
        #[arg(long)]
        id: String,
        /// JSON file with the before snapshot; omit to replay a creation
        #[arg(long)]
        before: Option<PathBuf>,
        /// JSON file with the after snapshot
        #[arg(long)]
        after: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = telemetry(&config)?;
    let engine = build_engine(&config).await?;

    match cli.command {
        Command::Serve => cmd_serve(engine).await,
        Command::Scan { at } => {
            let report = engine
                .handle(Trigger::Tick {
                    at: at.unwrap_or_else(Utc::now),
                })
                .await?;
            print_report(&report)
        }
        Command::Replay {
            collection,
            id,
            before,
            after,
        } => {
            let after = Some(read_document(&after)?);
            let trigger = match before {
                Some(path) => Trigger::Updated {
                    collection,
                    record_id: id,
                    before: Some(read_document(&path)?),
                    after,
                },
                None => Trigger::Created {
                    collection,
                    record_id: id,
                    after,
                },
            };
            let report = engine.handle(trigger).await?;
            print_report(&report)
        }
    }
}

fn telemetry(config: &Config) -> anyhow::Result<TelemetryGuard> {
    Ok(init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "roster-notify".to_string(),
        log_level: config.log_level.clone(),
    })?)
}

async fn build_engine(config: &Config) -> anyhow::Result<NotificationEngine> {
    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;

    let mut fcm = FcmConfig::new(
        config.fcm_project_id.clone(),
        config.fcm_access_token.expose_secret().to_string().into(),
    );
    // Leave the dispatcher's outer bound some slack so per-token answers
    // are collected before it fires.
    fcm.deadline = config.send_timeout * 9 / 10;
    let transport = FcmTransport::new(fcm)?;

    Ok(NotificationEngine::new(
        Arc::new(db),
        Arc::new(transport),
        EngineConfig::from(config),
    ))
}

async fn cmd_serve(engine: NotificationEngine) -> anyhow::Result<()> {
    let scheduler = engine.scheduler().clone();

    let stop = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        stop.shutdown();
    });

    scheduler.run().await?;
    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let raw = std::fs::read_to_string(path)?;
    match serde_json::from_str::<serde_json::Value>(&raw)? {
        serde_json::Value::Object(document) => Ok(document),
        _ => anyhow::bail!("{} does not contain a JSON object", path.display()),
    }
}

fn print_report(report: &InvocationReport) -> anyhow::Result<()> {
    if let Some(scan) = &report.scan {
        println!(
            "Scanned {} shift(s) for {}: {} reminded, {} already sent, {} unparseable, {} outside window",
            scan.candidates,
            scan.date,
            scan.reminded.len(),
            scan.already_sent,
            scan.unparseable,
            scan.outside_window
        );
    }

    if report.deliveries.is_empty() {
        println!("No notifications sent.");
        return Ok(());
    }

    println!(
        "{:<16}  {:<24}  {:<10}  {:<4}  {:<4}  STATUS",
        "TYPE", "RECORD", "RECIPIENTS", "OK", "FAIL"
    );
    println!("{}", "-".repeat(80));
    for delivery in &report.deliveries {
        println!(
            "{:<16}  {:<24}  {:<10}  {:<4}  {:<4}  {}",
            delivery.event_type,
            delivery.record_id,
            delivery.recipients.len(),
            delivery.success_count,
            delivery.failure_count,
            serde_json::to_string(&delivery.status)?
        );
        for endpoint in delivery.stale_endpoints() {
            println!("    stale endpoint: {endpoint}");
        }
    }

    println!("\n{} event(s)", report.events);
    Ok(())
}
