//! # driphubd — driphub daemon
//!
//! Composition root that wires all adapters together and runs the engine.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize tracing and the `SQLite` connection pool (with migrations)
//! - Construct adapter implementations and the engine
//! - Spawn the background loops (ingest, dispatcher, reaper) and the
//!   optional virtual traffic source
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use driphub_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteExecutionLog, SqliteRuleRepository,
};
use driphub_adapter_virtual::{
    LogActivity, LogMailer, LogNotifier, LogWebhook, MemoryProfileStore, VirtualTraffic,
};
use driphub_app::engine::{AutomationEngine, Delivery};
use driphub_app::event_bus::InProcessEventBus;
use driphub_domain::id::UserId;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Adapters
    let rule_repo = SqliteRuleRepository::new(pool.clone());
    let execution_log = SqliteExecutionLog::new(pool);
    let profiles = MemoryProfileStore::new();

    let demo_users: Vec<UserId> = (1..=4)
        .map(|i| UserId::from(format!("visitor-{i}")))
        .collect();
    if config.integrations.virtual_enabled {
        for user in &demo_users {
            profiles.seed_user(
                user,
                &[("email", serde_json::json!(format!("{user}@example.com")))],
            );
        }
    }

    // Engine
    let engine = Arc::new(AutomationEngine::new(
        config.engine_config(),
        config.history_tracker(),
        rule_repo,
        profiles,
        Delivery {
            mailer: LogMailer,
            webhook: LogWebhook,
            notifier: LogNotifier,
            activity: LogActivity,
        },
        execution_log,
    ));
    let loaded = engine.load_rules().await?;
    tracing::info!(rules = loaded, "driphubd started");

    // Background loops
    let bus = InProcessEventBus::new(256);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut tasks = vec![
        tokio::spawn(
            engine
                .clone()
                .run_ingest(bus.subscribe(), shutdown_rx.clone()),
        ),
        tokio::spawn(engine.clone().run_dispatcher(shutdown_rx.clone())),
        tokio::spawn(engine.clone().run_reaper(shutdown_rx.clone())),
    ];

    if config.integrations.virtual_enabled {
        let traffic = VirtualTraffic::new(
            bus.clone(),
            demo_users,
            Duration::from_secs(config.integrations.virtual_interval_secs),
        );
        tasks.push(tokio::spawn(traffic.run(shutdown_rx)));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
