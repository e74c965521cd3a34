//! Automation engine — matches incoming events against rules and drives
//! executions through their lifecycle.
//!
//! The engine owns the rule registry, the per-user event history, the
//! live-execution table, and the action queue. Incoming events are
//! matched synchronously on the caller's task; scheduled actions are
//! dispatched by a background loop that feeds results back into the
//! execution state machine. A second background loop reaps executions
//! that outlive their maximum lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use driphub_domain::error::{DripHubError, ExecutionError, NotFoundError};
use driphub_domain::event::{EventType, IncomingEvent};
use driphub_domain::execution::Execution;
use driphub_domain::id::{ExecutionId, RuleId, UserId};
use driphub_domain::rule::AutomationRule;
use driphub_domain::time::{self, Timestamp};

use crate::evaluator::ConditionEvaluator;
use crate::executor::{ActionExecutors, ActionOutcome};
use crate::history::EventHistoryTracker;
use crate::ports::{ActivityLog, ExecutionLog, Mailer, Notifier, ProfileStore, RuleRepository, WebhookCaller};
use crate::registry::RuleRegistry;
use crate::scheduler::{ActionQueue, QueuedAction};

/// Tunables for the engine's background behaviour.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the dispatcher polls the action queue.
    pub dispatch_interval: Duration,
    /// How often the reaper scans for stale executions.
    pub reaper_interval: Duration,
    /// Maximum lifetime of an execution before the reaper cancels it.
    pub max_execution_lifetime: Duration,
    /// Upper bound on a single outbound webhook call.
    pub webhook_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_millis(250),
            reaper_interval: Duration::from_secs(3600),
            max_execution_lifetime: Duration::from_secs(24 * 3600),
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

/// The delivery collaborators, bundled to keep wiring readable.
pub struct Delivery<M, W, N, A> {
    pub mailer: M,
    pub webhook: W,
    pub notifier: N,
    pub activity: A,
}

/// The rule-driven automation engine.
///
/// Constructed once at process start and shared behind an [`Arc`]; there
/// are no global singletons. Generic over its ports so tests can wire
/// in-memory doubles and the daemon can wire real adapters.
pub struct AutomationEngine<R, P, M, W, N, A, X> {
    config: EngineConfig,
    registry: RuleRegistry,
    history: EventHistoryTracker,
    executions: Mutex<HashMap<ExecutionId, Execution>>,
    queue: ActionQueue,
    rule_repo: R,
    profiles: P,
    delivery: Delivery<M, W, N, A>,
    execution_log: X,
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

impl<R, P, M, W, N, A, X> AutomationEngine<R, P, M, W, N, A, X>
where
    R: RuleRepository,
    P: ProfileStore,
    M: Mailer,
    W: WebhookCaller,
    N: Notifier,
    A: ActivityLog,
    X: ExecutionLog,
{
    /// Create a new engine over the given ports.
    pub fn new(
        config: EngineConfig,
        history: EventHistoryTracker,
        rule_repo: R,
        profiles: P,
        delivery: Delivery<M, W, N, A>,
        execution_log: X,
    ) -> Self {
        Self {
            config,
            registry: RuleRegistry::new(),
            history,
            executions: Mutex::new(HashMap::new()),
            queue: ActionQueue::new(),
            rule_repo,
            profiles,
            delivery,
            execution_log,
        }
    }

    /// The in-memory rule table.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// The per-user event history.
    pub fn history(&self) -> &EventHistoryTracker {
        &self.history
    }

    /// Number of live executions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.executions.lock().expect("executions lock poisoned").len()
    }

    /// Number of scheduled actions waiting to run.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    // ── Rule administration ────────────────────────────────────────

    /// Populate the registry from the rule repository.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository.
    pub async fn load_rules(&self) -> Result<usize, DripHubError> {
        let rules = self.rule_repo.get_all().await?;
        let count = rules.len();
        for rule in rules {
            self.registry.upsert(rule);
        }
        tracing::info!(count, "rules loaded from storage");
        Ok(count)
    }

    /// Validate, persist, and publish a rule definition.
    ///
    /// Malformed rules are rejected here, at save time — never when an
    /// event is being dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`DripHubError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_name = %rule.name))]
    pub async fn upsert_rule(&self, mut rule: AutomationRule) -> Result<AutomationRule, DripHubError> {
        rule.validate()?;
        rule.updated_at = time::now();
        let saved = self.rule_repo.save(rule).await?;
        self.registry.upsert(saved.clone());
        Ok(saved)
    }

    /// Delete a rule, cancelling any of its live executions first.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), DripHubError> {
        let live: Vec<ExecutionId> = {
            let executions = self.executions.lock().expect("executions lock poisoned");
            executions
                .values()
                .filter(|e| e.rule_id == id)
                .map(|e| e.id)
                .collect()
        };
        for execution_id in live {
            if let Err(err) = self.cancel_execution(execution_id).await {
                tracing::debug!(%execution_id, %err, "execution finished before rule deletion");
            }
        }
        self.rule_repo.delete(id).await?;
        self.registry.remove(id);
        Ok(())
    }

    // ── Trigger matching ───────────────────────────────────────────

    /// Feed a business event into the engine.
    ///
    /// Records the event into history first, then starts an execution for
    /// every enabled rule listening for this event kind whose cooldown,
    /// trigger cap, and custom conditions all allow it. Returns the ids
    /// of the executions started; the actual work happens asynchronously
    /// on the dispatcher.
    #[tracing::instrument(skip(self, data), fields(user = %user_id, event = %event_type))]
    pub async fn trigger_event(
        &self,
        event_type: EventType,
        user_id: &UserId,
        data: serde_json::Value,
    ) -> Vec<ExecutionId> {
        let now = time::now();
        self.history.record_event(user_id, event_type, data.clone(), now);

        let mut started = Vec::new();
        for rule in self.registry.for_event(event_type) {
            if !self.trigger_allows(&rule, user_id, now) {
                continue;
            }
            let evaluator = ConditionEvaluator::new(&self.profiles, &self.history);
            if !evaluator
                .all_hold(&rule.trigger.conditions, user_id, &data, now)
                .await
            {
                continue;
            }
            self.history.record_firing(user_id, rule.id, now);
            let id = self
                .start_execution(&rule, user_id.clone(), data.clone(), rule.trigger.delay_minutes)
                .await;
            started.push(id);
        }
        started
    }

    /// Convenience wrapper for bus-delivered events.
    pub async fn process_event(&self, event: IncomingEvent) -> Vec<ExecutionId> {
        self.trigger_event(event.event_type, &event.user_id, event.data)
            .await
    }

    /// Cooldown and max-trigger gates, checked before custom conditions.
    fn trigger_allows(&self, rule: &AutomationRule, user_id: &UserId, now: Timestamp) -> bool {
        if let Some(cooldown) = rule.trigger.cooldown() {
            if let Some(last) = self.history.last_firing(user_id, rule.id) {
                if now - last < cooldown {
                    return false;
                }
            }
        }
        if rule.trigger.max_triggers > 0 {
            let fired = self.history.firing_count(user_id, rule.id);
            if fired >= rule.trigger.max_triggers as usize {
                return false;
            }
        }
        true
    }

    // ── Execution lifecycle ────────────────────────────────────────

    /// Create an execution and schedule its first step.
    ///
    /// A rule with no actions completes immediately. `extra_delay_minutes`
    /// carries the trigger delay (or a follow-up delay) on top of the
    /// first step's own delay.
    async fn start_execution(
        &self,
        rule: &AutomationRule,
        user_id: UserId,
        trigger_data: serde_json::Value,
        extra_delay_minutes: u32,
    ) -> ExecutionId {
        let now = time::now();
        let mut execution = Execution::new(rule.id, user_id, trigger_data, now);
        let id = execution.id;
        tracing::info!(execution_id = %id, rule = %rule.name, user = %execution.user_id, "execution started");
        self.record_start(&execution).await;

        if let Some(first) = rule.actions.first() {
            {
                let mut executions = self.executions.lock().expect("executions lock poisoned");
                executions.insert(id, execution);
            }
            let delay = minutes(extra_delay_minutes.saturating_add(first.delay_minutes));
            self.queue.schedule(id, 0, delay, now);
        } else {
            let _ = execution.complete(now);
            self.record_end(&execution).await;
        }
        id
    }

    /// Apply one action's result to its execution.
    ///
    /// Idempotent per `(execution_id, action_index)`: results for a
    /// finished execution or a stale index are discarded.
    async fn on_action_result(
        &self,
        execution_id: ExecutionId,
        action_index: usize,
        outcome: ActionOutcome,
    ) {
        let now = time::now();
        let mut finished: Option<Execution> = None;
        let mut next_step: Option<(usize, u32)> = None;
        {
            let mut executions = self.executions.lock().expect("executions lock poisoned");
            let Some(execution) = executions.get_mut(&execution_id) else {
                return;
            };
            if execution.current_step != action_index {
                return;
            }
            match self.registry.get(execution.rule_id) {
                None => {
                    let _ = execution.fail("rule removed", now);
                    finished = executions.remove(&execution_id);
                }
                Some(rule) => {
                    let step = rule.actions.get(action_index);
                    let required = step.is_some_and(|s| s.required);
                    if let ActionOutcome::Failed(message) = &outcome {
                        if required {
                            let kind = step.map_or("unknown", |s| s.kind.name());
                            let _ = execution.fail(
                                format!("step {action_index} ({kind}) failed: {message}"),
                                now,
                            );
                            finished = executions.remove(&execution_id);
                        } else {
                            tracing::debug!(
                                %execution_id,
                                action_index,
                                %message,
                                "optional step failed, continuing"
                            );
                        }
                    }
                    if finished.is_none() {
                        let execution = executions
                            .get_mut(&execution_id)
                            .expect("execution present under lock");
                        execution.advance();
                        if execution.current_step >= rule.actions.len() {
                            let _ = execution.complete(now);
                            finished = executions.remove(&execution_id);
                        } else {
                            let delay = rule.actions[execution.current_step].delay_minutes;
                            next_step = Some((execution.current_step, delay));
                        }
                    }
                }
            }
        }

        if let Some((index, delay)) = next_step {
            self.queue.schedule(execution_id, index, minutes(delay), now);
        }
        if let Some(execution) = finished {
            self.queue.remove_execution(execution_id);
            self.record_end(&execution).await;
            tracing::info!(
                %execution_id,
                status = %execution.status,
                "execution finished"
            );
        }
    }

    /// Cancel a live execution and drop its pending actions.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AlreadyTerminal`] when the execution has
    /// already finished, or [`DripHubError::NotFound`] when the id is
    /// unknown.
    pub async fn cancel_execution(&self, id: ExecutionId) -> Result<(), DripHubError> {
        let now = time::now();
        let cancelled = {
            let mut executions = self.executions.lock().expect("executions lock poisoned");
            match executions.get_mut(&id) {
                Some(execution) => {
                    execution.cancel(now)?;
                    executions.remove(&id)
                }
                None => None,
            }
        };
        match cancelled {
            Some(execution) => {
                self.queue.remove_execution(id);
                self.record_end(&execution).await;
                tracing::info!(execution_id = %id, "execution cancelled");
                Ok(())
            }
            None => {
                if self.execution_log.get_by_id(id).await?.is_some() {
                    Err(ExecutionError::AlreadyTerminal { id }.into())
                } else {
                    Err(NotFoundError {
                        entity: "Execution",
                        id: id.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    /// Cancel every live execution started before `cutoff`. Returns the
    /// ids that were reaped.
    pub async fn reap_expired(&self, cutoff: Timestamp) -> Vec<ExecutionId> {
        let stale: Vec<ExecutionId> = {
            let executions = self.executions.lock().expect("executions lock poisoned");
            executions
                .values()
                .filter(|e| e.started_at < cutoff)
                .map(|e| e.id)
                .collect()
        };
        let mut reaped = Vec::new();
        for id in stale {
            match self.cancel_execution(id).await {
                Ok(()) => {
                    tracing::warn!(execution_id = %id, "execution exceeded max lifetime, cancelled");
                    reaped.push(id);
                }
                Err(err) => {
                    tracing::debug!(execution_id = %id, %err, "execution finished before reaping");
                }
            }
        }
        reaped
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Look up an execution: the live table first, then the log.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the execution log.
    pub async fn execution(&self, id: ExecutionId) -> Result<Option<Execution>, DripHubError> {
        if let Some(execution) = self.live_execution(id) {
            return Ok(Some(execution));
        }
        self.execution_log.get_by_id(id).await
    }

    /// Executions for a user, live and logged, newest-first.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the execution log.
    pub async fn executions_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Execution>, DripHubError> {
        let mut merged = self.execution_log.find_by_user(user_id, limit).await?;
        let live: Vec<Execution> = {
            let executions = self.executions.lock().expect("executions lock poisoned");
            executions
                .values()
                .filter(|e| &e.user_id == user_id)
                .cloned()
                .collect()
        };
        for execution in live {
            match merged.iter_mut().find(|e| e.id == execution.id) {
                // The live state is fresher than the logged snapshot.
                Some(slot) => *slot = execution,
                None => merged.push(execution),
            }
        }
        merged.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        merged.truncate(limit);
        Ok(merged)
    }

    fn live_execution(&self, id: ExecutionId) -> Option<Execution> {
        let executions = self.executions.lock().expect("executions lock poisoned");
        executions.get(&id).cloned()
    }

    fn is_live(&self, id: ExecutionId) -> bool {
        let executions = self.executions.lock().expect("executions lock poisoned");
        executions.contains_key(&id)
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Pop and dispatch every ready action. Returns how many were popped.
    ///
    /// Exposed so tests (and callers without a background runtime) can
    /// step the engine deterministically.
    pub async fn dispatch_due(&self) -> usize {
        let due = self.queue.pop_ready(Instant::now());
        let count = due.len();
        for item in due {
            self.dispatch_item(item).await;
        }
        count
    }

    async fn dispatch_item(&self, item: QueuedAction) {
        let Some(execution) = self.live_execution(item.execution_id) else {
            tracing::debug!(
                execution_id = %item.execution_id,
                "scheduled action for finished execution, dropping"
            );
            return;
        };
        if execution.current_step != item.action_index {
            return;
        }
        let Some(rule) = self.registry.get(execution.rule_id) else {
            self.fail_removed_rule(item.execution_id).await;
            return;
        };
        let Some(step) = rule.actions.get(item.action_index).cloned() else {
            // The rule was edited shorter than this execution got; settle
            // the step so the execution can complete.
            self.on_action_result(item.execution_id, item.action_index, ActionOutcome::Completed)
                .await;
            return;
        };

        if !step.condition.is_empty() {
            let now = time::now();
            let evaluator = ConditionEvaluator::new(&self.profiles, &self.history);
            let held = evaluator
                .all_hold(&step.condition, &execution.user_id, &execution.trigger_data, now)
                .await;
            if !held {
                tracing::debug!(
                    execution_id = %item.execution_id,
                    action_index = item.action_index,
                    "step guard unsatisfied, skipping"
                );
                self.on_action_result(item.execution_id, item.action_index, ActionOutcome::Skipped)
                    .await;
                return;
            }
        }

        // A cancel may have landed while the guard was evaluating; check
        // one last time before the side effect fires.
        if !self.is_live(item.execution_id) {
            return;
        }

        let (outcome, followup) = self.executors().execute(&step.kind, &execution).await;
        if let Some(request) = followup {
            let followup_id = self
                .start_execution(
                    &request.rule,
                    execution.user_id.clone(),
                    execution.trigger_data.clone(),
                    request.delay_minutes,
                )
                .await;
            tracing::info!(
                execution_id = %item.execution_id,
                followup_execution = %followup_id,
                rule = %request.rule.name,
                "follow-up execution scheduled"
            );
        }
        self.on_action_result(item.execution_id, item.action_index, outcome)
            .await;
    }

    async fn fail_removed_rule(&self, execution_id: ExecutionId) {
        let now = time::now();
        let finished = {
            let mut executions = self.executions.lock().expect("executions lock poisoned");
            if let Some(execution) = executions.get_mut(&execution_id) {
                let _ = execution.fail("rule removed", now);
            }
            executions.remove(&execution_id)
        };
        if let Some(execution) = finished {
            self.queue.remove_execution(execution_id);
            self.record_end(&execution).await;
            tracing::warn!(%execution_id, "rule removed mid-flight, execution failed");
        }
    }

    fn executors(&self) -> ActionExecutors<'_, P, M, W, N, A> {
        ActionExecutors {
            profiles: &self.profiles,
            mailer: &self.delivery.mailer,
            webhook: &self.delivery.webhook,
            notifier: &self.delivery.notifier,
            activity: &self.delivery.activity,
            registry: &self.registry,
            history: &self.history,
            webhook_timeout: self.config.webhook_timeout,
        }
    }

    async fn record_start(&self, execution: &Execution) {
        if let Err(err) = self.execution_log.record_start(execution).await {
            tracing::warn!(execution_id = %execution.id, %err, "failed to record execution start");
        }
    }

    async fn record_end(&self, execution: &Execution) {
        if let Err(err) = self.execution_log.record_end(execution).await {
            tracing::warn!(execution_id = %execution.id, %err, "failed to record execution end");
        }
    }

    // ── Background loops ───────────────────────────────────────────

    /// Drain the action queue until shutdown is signalled.
    ///
    /// Every per-item failure is handled inside the dispatch; nothing
    /// can crash this loop.
    pub async fn run_dispatcher(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.dispatch_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!("dispatcher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch_due().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("dispatcher stopped");
    }

    /// Periodically reap stale executions and prune aged history.
    pub async fn run_reaper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.reaper_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!("reaper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = time::now();
                    if let Ok(lifetime) = chrono::Duration::from_std(self.config.max_execution_lifetime) {
                        let reaped = self.reap_expired(now - lifetime).await;
                        let pruned = self.history.prune(now);
                        if !reaped.is_empty() || pruned > 0 {
                            tracing::info!(reaped = reaped.len(), pruned, "cleanup pass finished");
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("reaper stopped");
    }

    /// Consume events from a bus subscription until shutdown.
    pub async fn run_ingest(
        self: Arc<Self>,
        mut events: broadcast::Receiver<IncomingEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::debug!("ingest started");
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let started = self.process_event(event).await;
                        if !started.is_empty() {
                            tracing::debug!(count = started.len(), "event started executions");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event bus lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("ingest stopped");
    }
}
