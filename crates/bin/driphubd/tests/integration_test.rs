//! End-to-end tests for the full driphubd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, real
//! repositories, the real engine with its background loops) and drives it
//! through the public API under tokio's paused clock, so delays measured
//! in minutes run instantly and deterministically.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use driphub_adapter_storage_sqlite_sqlx::{Config, SqliteExecutionLog, SqliteRuleRepository};
use driphub_adapter_virtual::{
    LogActivity, LogNotifier, LogWebhook, MemoryProfileStore, VirtualTraffic,
};
use driphub_app::engine::{AutomationEngine, Delivery, EngineConfig};
use driphub_app::event_bus::InProcessEventBus;
use driphub_app::history::EventHistoryTracker;
use driphub_app::ports::Mailer;
use driphub_domain::error::{DeliveryError, DripHubError};
use driphub_domain::event::EventType;
use driphub_domain::execution::ExecutionStatus;
use driphub_domain::id::UserId;
use driphub_domain::rule::{ActionKind, ActionStep, AutomationRule, CompareOp, Condition, Trigger};
use serde_json::json;

/// Mailer that records recipients and can be told to fail.
#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failing: bool,
}

impl RecordingMailer {
    fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failing: true,
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(
        &self,
        recipient: &str,
        template_id: &str,
        _context: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DripHubError>> + Send {
        let result = if self.failing {
            Err(DeliveryError::Mailer("smtp rejected".to_string()).into())
        } else {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), template_id.to_string()));
            Ok(())
        };
        async { result }
    }
}

type Engine = AutomationEngine<
    SqliteRuleRepository,
    MemoryProfileStore,
    RecordingMailer,
    LogWebhook,
    LogNotifier,
    LogActivity,
    SqliteExecutionLog,
>;

/// Build a fully-wired engine over an in-memory `SQLite` database, with a
/// fast dispatcher and one seeded user.
async fn engine_with(mailer: RecordingMailer) -> Arc<Engine> {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");
    let pool = db.pool().clone();

    let profiles = MemoryProfileStore::new();
    profiles.seed_user(&user("u1"), &[("email", json!("u1@example.com"))]);

    let config = EngineConfig {
        dispatch_interval: Duration::from_millis(50),
        reaper_interval: Duration::from_secs(3600),
        ..EngineConfig::default()
    };

    Arc::new(AutomationEngine::new(
        config,
        EventHistoryTracker::default(),
        SqliteRuleRepository::new(pool.clone()),
        profiles,
        Delivery {
            mailer,
            webhook: LogWebhook,
            notifier: LogNotifier,
            activity: LogActivity,
        },
        SqliteExecutionLog::new(pool),
    ))
}

fn user(id: &str) -> UserId {
    UserId::from(id)
}

fn spawn_dispatcher(engine: &Arc<Engine>) -> tokio::sync::watch::Sender<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(engine.clone().run_dispatcher(rx));
    tx
}

async fn settle() {
    // Let the paused clock run the dispatcher through pending delays.
    tokio::time::sleep(Duration::from_secs(120)).await;
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_complete_welcome_sequence_end_to_end() {
    let mailer = RecordingMailer::default();
    let engine = engine_with(mailer.clone()).await;
    let stop = spawn_dispatcher(&engine);

    let rule = AutomationRule::builder()
        .name("Purchase thanks")
        .trigger(Trigger::on(EventType::PurchaseComplete))
        .action(ActionStep::new(ActionKind::SendEmail {
            template_id: "thanks".to_string(),
            subject: Some("Thank you!".to_string()),
        }))
        .action(
            ActionStep::new(ActionKind::LogEvent {
                name: "thanks_sent".to_string(),
                data: json!({}),
            })
            .optional(),
        )
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let started = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({"amount": 80}))
        .await;
    assert_eq!(started.len(), 1);

    settle().await;

    assert_eq!(mailer.sent(), [("u1@example.com".to_string(), "thanks".to_string())]);
    let finished = engine.execution(started[0]).await.unwrap().unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert!(finished.error_message.is_none());

    let _ = stop.send(true);
}

#[tokio::test(start_paused = true)]
async fn should_honour_step_delays_before_dispatch() {
    let mailer = RecordingMailer::default();
    let engine = engine_with(mailer.clone()).await;
    let stop = spawn_dispatcher(&engine);

    let rule = AutomationRule::builder()
        .name("Delayed nudge")
        .trigger(Trigger::on(EventType::CartAbandoned))
        .action(
            ActionStep::new(ActionKind::SendEmail {
                template_id: "nudge".to_string(),
                subject: None,
            })
            .after_minutes(30),
        )
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    engine
        .trigger_event(EventType::CartAbandoned, &user("u1"), json!({}))
        .await;

    // Well before the delay: nothing sent yet.
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert!(mailer.sent().is_empty());

    // Past the delay: the nudge goes out.
    tokio::time::sleep(Duration::from_secs(25 * 60)).await;
    assert_eq!(mailer.sent().len(), 1);

    let _ = stop.send(true);
}

// ---------------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_fail_execution_when_required_email_fails() {
    let engine = engine_with(RecordingMailer::failing()).await;
    let stop = spawn_dispatcher(&engine);

    let rule = AutomationRule::builder()
        .name("Purchase thanks")
        .trigger(Trigger::on(EventType::PurchaseComplete))
        .action(ActionStep::new(ActionKind::SendEmail {
            template_id: "thanks".to_string(),
            subject: None,
        }))
        .action(ActionStep::new(ActionKind::Wait))
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let started = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({}))
        .await;

    settle().await;

    let finished = engine.execution(started[0]).await.unwrap().unwrap();
    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert_eq!(finished.current_step, 0);
    let message = finished.error_message.expect("failed runs carry a message");
    assert!(message.contains("send_email"));

    let _ = stop.send(true);
}

// ---------------------------------------------------------------------------
// Trigger gates
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_enforce_cooldown_between_firings() {
    let engine = engine_with(RecordingMailer::default()).await;

    let rule = AutomationRule::builder()
        .name("Cooled down")
        .trigger(Trigger::on(EventType::PurchaseComplete).cooldown_hours(24))
        .action(ActionStep::new(ActionKind::Wait))
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let first = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({}))
        .await;
    let second = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({}))
        .await;

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());

    let all = engine.executions_for_user(&user("u1"), 10).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn should_gate_on_event_amount() {
    let engine = engine_with(RecordingMailer::default()).await;

    let rule = AutomationRule::builder()
        .name("Big spender")
        .trigger(Trigger::on(EventType::PurchaseComplete).when(Condition::Event {
            field: "amount".to_string(),
            op: CompareOp::Gte,
            value: json!(100),
        }))
        .action(ActionStep::new(ActionKind::Wait))
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let low = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({"amount": 50}))
        .await;
    let high = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({"amount": 150}))
        .await;

    assert!(low.is_empty());
    assert_eq!(high.len(), 1);
}

// ---------------------------------------------------------------------------
// Cancellation & reaping
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_not_dispatch_cancelled_execution() {
    let mailer = RecordingMailer::default();
    let engine = engine_with(mailer.clone()).await;
    let stop = spawn_dispatcher(&engine);

    let rule = AutomationRule::builder()
        .name("Delayed mail")
        .trigger(Trigger::on(EventType::PurchaseComplete))
        .action(
            ActionStep::new(ActionKind::SendEmail {
                template_id: "thanks".to_string(),
                subject: None,
            })
            .after_minutes(5),
        )
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let started = engine
        .trigger_event(EventType::PurchaseComplete, &user("u1"), json!({}))
        .await;
    engine.cancel_execution(started[0]).await.unwrap();

    settle().await;

    assert!(mailer.sent().is_empty());
    let finished = engine.execution(started[0]).await.unwrap().unwrap();
    assert_eq!(finished.status, ExecutionStatus::Cancelled);

    let _ = stop.send(true);
}

#[tokio::test(start_paused = true)]
async fn should_reap_execution_past_its_lifetime() {
    let mailer = RecordingMailer::default();
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .unwrap();
    let pool = db.pool().clone();
    let profiles = MemoryProfileStore::new();

    // Degenerate lifetime so the very next reaper pass collects the run.
    let config = EngineConfig {
        dispatch_interval: Duration::from_millis(50),
        reaper_interval: Duration::from_secs(1),
        max_execution_lifetime: Duration::ZERO,
        ..EngineConfig::default()
    };
    let engine: Arc<Engine> = Arc::new(AutomationEngine::new(
        config,
        EventHistoryTracker::default(),
        SqliteRuleRepository::new(pool.clone()),
        profiles,
        Delivery {
            mailer,
            webhook: LogWebhook,
            notifier: LogNotifier,
            activity: LogActivity,
        },
        SqliteExecutionLog::new(pool),
    ));

    let rule = AutomationRule::builder()
        .name("Stuck drip")
        .trigger(Trigger::on(EventType::UserSignup))
        .action(ActionStep::new(ActionKind::Wait).after_minutes(600))
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let started = engine
        .trigger_event(EventType::UserSignup, &user("u1"), json!({}))
        .await;
    assert_eq!(engine.active_count(), 1);

    let (stop, reaper_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(engine.clone().run_reaper(reaper_rx));

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(engine.active_count(), 0);
    let finished = engine.execution(started[0]).await.unwrap().unwrap();
    assert_eq!(finished.status, ExecutionStatus::Cancelled);

    let _ = stop.send(true);
}

// ---------------------------------------------------------------------------
// Event bus ingest
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_run_executions_from_virtual_traffic() {
    let engine = engine_with(RecordingMailer::default()).await;

    let rule = AutomationRule::builder()
        .name("Signup marker")
        .trigger(Trigger::on(EventType::UserSignup))
        .build()
        .unwrap();
    engine.upsert_rule(rule).await.unwrap();

    let bus = InProcessEventBus::new(64);
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(
        engine
            .clone()
            .run_ingest(bus.subscribe(), stop_rx.clone()),
    );

    let traffic = VirtualTraffic::new(
        bus,
        vec![user("visitor-1")],
        Duration::from_secs(5),
    );
    tokio::spawn(traffic.run(stop_rx));

    tokio::time::sleep(Duration::from_secs(12)).await;

    let runs = engine
        .executions_for_user(&user("visitor-1"), 10)
        .await
        .unwrap();
    assert!(!runs.is_empty());
    assert!(runs.iter().all(|e| e.status == ExecutionStatus::Completed));

    let _ = stop_tx.send(true);
}

// ---------------------------------------------------------------------------
// Persistence across engine instances
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn should_reload_rules_from_storage() {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .unwrap();
    let pool = db.pool().clone();

    let make = |pool: sqlx::SqlitePool| {
        AutomationEngine::new(
            EngineConfig::default(),
            EventHistoryTracker::default(),
            SqliteRuleRepository::new(pool.clone()),
            MemoryProfileStore::new(),
            Delivery {
                mailer: RecordingMailer::default(),
                webhook: LogWebhook,
                notifier: LogNotifier,
                activity: LogActivity,
            },
            SqliteExecutionLog::new(pool),
        )
    };

    let first = make(pool.clone());
    let rule = AutomationRule::builder()
        .name("Persisted")
        .trigger(Trigger::on(EventType::UserSignup))
        .action(ActionStep::new(ActionKind::Wait))
        .build()
        .unwrap();
    let rule_id = rule.id;
    first.upsert_rule(rule).await.unwrap();
    drop(first);

    // A fresh engine over the same database sees the rule again.
    let second = make(pool);
    assert_eq!(second.load_rules().await.unwrap(), 1);
    assert_eq!(second.registry().get(rule_id).unwrap().name, "Persisted");
}
