/*!
 * The LedgerFlow rule engine.
 *
 * This module orchestrates rule processing: it subscribes to automation
 * events, fetches the enabled rules for a trigger, evaluates each rule's
 * condition tree in priority order, executes actions on a match, writes one
 * audit log entry per rule per event, and applies the run-once and
 * stop-on-match policies.
 *
 * Automation is best-effort: no failure in here may propagate to the
 * business operation that produced the event.
 */
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ledgerflow_core::event::{listener, AutomationEvent, EventBus, Subscription};
use ledgerflow_core::types::Entity;

use crate::action::{ActionExecutor, ExecutionContext, ServiceCapabilities};
use crate::condition::{ConditionEvaluator, EvalContext, InGroupFn};
use crate::repository::RuleRepository;
use crate::rule::{
    ActionResult, EntityType, ExecutionStatus, Rule, RuleExecutionLog, WorkspaceId,
};

/// Request for the synchronous trigger entry point.
///
/// Producing services use this to await completion and inspect aggregate
/// counts instead of firing through the event bus. When `services` is
/// omitted the engine falls back to its own capabilities, if any; with
/// neither present, matched rules still log but every action fails with
/// "services not provided".
#[derive(Clone)]
pub struct TriggerRequest {
    /// Entity type of the mutated entity
    pub entity_type: EntityType,
    /// Event name, e.g. "created"
    pub event: String,
    /// Identifier of the mutated entity, when known
    pub entity_id: Option<String>,
    /// Full current-state record of the entity
    pub entity: Entity,
    /// Record state before the mutation, for update events
    pub previous_entity: Option<Entity>,
    /// Capabilities to execute actions with for this call
    pub services: Option<Arc<ServiceCapabilities>>,
}

impl TriggerRequest {
    /// Create a trigger request
    pub fn new<S: Into<String>>(entity_type: EntityType, event: S, entity: Entity) -> Self {
        Self {
            entity_type,
            event: event.into(),
            entity_id: None,
            entity,
            previous_entity: None,
            services: None,
        }
    }

    /// Set the entity identifier
    pub fn with_entity_id<S: Into<String>>(mut self, entity_id: S) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the pre-mutation record state
    pub fn with_previous_entity(mut self, previous: Entity) -> Self {
        self.previous_entity = Some(previous);
        self
    }

    /// Set the capabilities used to execute actions
    pub fn with_services(mut self, services: Arc<ServiceCapabilities>) -> Self {
        self.services = Some(services);
        self
    }
}

/// Aggregate outcome of one rule-processing pass
#[derive(Debug, Clone, Default)]
pub struct TriggerSummary {
    /// How many rules had their conditions evaluated
    pub rules_evaluated: usize,
    /// How many rules matched
    pub rules_matched: usize,
    /// How many actions executed successfully
    pub actions_executed: usize,
    /// Failures collected along the way; never raised to the caller
    pub errors: Vec<String>,
}

/// Per-action verdict of a dry-run rule test
#[derive(Debug, Clone)]
pub struct RuleTestReport {
    /// Whether the condition tree matched the sample entity
    pub matched: bool,
    /// Dry-run outcome per configured action; empty when unmatched
    pub action_results: Vec<ActionResult>,
}

/// An automation rule engine scoped to one workspace
pub struct RuleEngine {
    workspace_id: WorkspaceId,
    repository: Arc<dyn RuleRepository>,
    services: Option<Arc<ServiceCapabilities>>,
    in_group: Option<InGroupFn>,
    executor: ActionExecutor,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl RuleEngine {
    /// Create a new engine for a workspace
    pub fn new<W: Into<WorkspaceId>>(workspace_id: W, repository: Arc<dyn RuleRepository>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            repository,
            services: None,
            in_group: None,
            executor: ActionExecutor::new(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Supply default capabilities for actions triggered through the bus
    pub fn with_services(mut self, services: Arc<ServiceCapabilities>) -> Self {
        self.services = Some(services);
        self
    }

    /// Supply a category-hierarchy resolver for `inGroup` conditions
    pub fn with_in_group(mut self, resolver: InGroupFn) -> Self {
        self.in_group = Some(resolver);
        self
    }

    /// The workspace this engine serves
    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// Subscribe the engine to every entity type on the bus.
    ///
    /// Events for other workspaces are ignored. Calling `attach` twice
    /// duplicates subscriptions; the registry guarantees it is called once
    /// per workspace.
    pub fn attach(self: Arc<Self>, bus: &EventBus) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription list poisoned");

        for entity_type in EntityType::ALL {
            let engine = Arc::clone(&self);
            let subscription = bus.on_all(
                entity_type.as_str(),
                listener(move |event: AutomationEvent| {
                    let engine = Arc::clone(&engine);
                    async move {
                        engine.handle_event(&event).await;
                        Ok(())
                    }
                }),
            );
            subscriptions.push(subscription);
        }

        info!(workspace_id = %self.workspace_id, "Rule engine attached to event bus");
    }

    /// Remove every bus subscription held by this engine.
    ///
    /// Required for clean teardown; forgetting it leaks listeners across
    /// engine lifetimes.
    pub fn detach(&self) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription list poisoned");
        for subscription in subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        debug!(workspace_id = %self.workspace_id, "Rule engine detached from event bus");
    }

    /// Process an event received from the bus.
    ///
    /// Fire-and-forget semantics: failures are logged and folded into the
    /// (discarded) summary, never raised.
    pub async fn handle_event(&self, event: &AutomationEvent) {
        if event.workspace_id != self.workspace_id.as_str() {
            return;
        }

        let entity_type = match event.entity_type.parse::<EntityType>() {
            Ok(entity_type) => entity_type,
            Err(e) => {
                warn!(entity_type = %event.entity_type, error = %e, "Event with unknown entity type");
                return;
            }
        };

        let summary = self
            .process(
                entity_type,
                &event.event,
                event.entity_id.as_deref(),
                &event.entity,
                self.services.clone(),
            )
            .await;

        for failure in &summary.errors {
            warn!(workspace_id = %self.workspace_id, failure = %failure, "Automation failure during event handling");
        }
    }

    /// Synchronous trigger entry point for producing services.
    ///
    /// Identical per-rule semantics to the bus path; only the caller's
    /// visibility into results differs.
    pub async fn trigger(&self, request: TriggerRequest) -> TriggerSummary {
        let services = request.services.or_else(|| self.services.clone());
        self.process(
            request.entity_type,
            &request.event,
            request.entity_id.as_deref(),
            &request.entity,
            services,
        )
        .await
    }

    /// Dry-run a rule against a sample entity.
    ///
    /// Evaluates the condition tree and reports, per configured action,
    /// whether it would execute. No handler runs, no log is written, and no
    /// repository state changes.
    pub async fn test_rule(&self, rule: &Rule, entity: &Entity) -> RuleTestReport {
        let matched =
            ConditionEvaluator::evaluate_group(&rule.conditions, entity, &self.eval_context());
        if !matched {
            return RuleTestReport {
                matched: false,
                action_results: Vec::new(),
            };
        }

        let ctx = ExecutionContext::dry_run(self.workspace_id.clone());
        let action_results = self
            .executor
            .execute_actions(
                &rule.actions,
                entity,
                rule.trigger.entity_type,
                None,
                &ctx,
            )
            .await;

        RuleTestReport {
            matched: true,
            action_results,
        }
    }

    fn eval_context(&self) -> EvalContext {
        match &self.in_group {
            Some(resolver) => EvalContext::new().with_in_group(Arc::clone(resolver)),
            None => EvalContext::new(),
        }
    }

    /// The shared rule-processing pass behind both entry points
    async fn process(
        &self,
        entity_type: EntityType,
        event: &str,
        entity_id: Option<&str>,
        entity: &Entity,
        services: Option<Arc<ServiceCapabilities>>,
    ) -> TriggerSummary {
        let mut summary = TriggerSummary::default();

        let mut rules = match self
            .repository
            .find_by_trigger(&self.workspace_id, entity_type, event)
            .await
        {
            Ok(rules) => rules,
            Err(e) => {
                error!(workspace_id = %self.workspace_id, error = %e, "Failed to fetch rules for trigger");
                summary.errors.push(format!("Failed to fetch rules: {}", e));
                return summary;
            }
        };

        if rules.is_empty() {
            return summary;
        }

        // Higher priority first; the sort is stable, so ties keep the
        // repository's insertion order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let eval_ctx = self.eval_context();

        for rule in &rules {
            summary.rules_evaluated += 1;
            let started = Instant::now();

            let matched = ConditionEvaluator::evaluate_group(&rule.conditions, entity, &eval_ctx);

            if !matched {
                let log = self.build_log(
                    rule,
                    event,
                    entity_type,
                    entity_id,
                    entity,
                    ExecutionStatus::Skipped,
                    false,
                    Vec::new(),
                    None,
                    started,
                );
                self.write_log(log, &mut summary).await;
                continue;
            }

            summary.rules_matched += 1;
            debug!(rule = %rule.name, trigger = %rule.trigger, "Rule matched");

            let ctx = ExecutionContext::new(self.workspace_id.clone(), services.clone());
            let results = self
                .executor
                .execute_actions(&rule.actions, entity, entity_type, entity_id, &ctx)
                .await;

            summary.actions_executed += results.iter().filter(|r| r.success).count();
            let all_succeeded = results.iter().all(|r| r.success);

            let mut failures: Vec<String> = Vec::new();
            for result in results.iter().filter(|r| !r.success) {
                let message = format!(
                    "Rule '{}' action '{}' failed: {}",
                    rule.name,
                    result.action_id,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                summary.errors.push(message.clone());
                failures.push(message);
            }

            let status = if all_succeeded {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failed
            };
            let error_message = if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            };

            let log = self.build_log(
                rule,
                event,
                entity_type,
                entity_id,
                entity,
                status,
                true,
                results,
                error_message,
                started,
            );
            self.write_log(log, &mut summary).await;

            if let Err(e) = self.repository.update_stats(&rule.id).await {
                warn!(rule = %rule.name, error = %e, "Failed to update rule statistics");
                summary
                    .errors
                    .push(format!("Failed to update stats for '{}': {}", rule.name, e));
            }

            if rule.run_once && all_succeeded {
                match self.repository.disable(&rule.id).await {
                    Ok(()) => info!(rule = %rule.name, "Run-once rule disabled after success"),
                    Err(e) => {
                        warn!(rule = %rule.name, error = %e, "Failed to disable run-once rule");
                        summary
                            .errors
                            .push(format!("Failed to disable '{}': {}", rule.name, e));
                    }
                }
            }

            if rule.stop_on_match {
                debug!(rule = %rule.name, "Stop-on-match; remaining rules skipped");
                break;
            }
        }

        summary
    }

    #[allow(clippy::too_many_arguments)]
    fn build_log(
        &self,
        rule: &Rule,
        event: &str,
        entity_type: EntityType,
        entity_id: Option<&str>,
        entity: &Entity,
        status: ExecutionStatus,
        conditions_matched: bool,
        actions_executed: Vec<ActionResult>,
        error_message: Option<String>,
        started: Instant,
    ) -> RuleExecutionLog {
        RuleExecutionLog {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            workspace_id: self.workspace_id.clone(),
            trigger_event: event.to_string(),
            entity_type,
            entity_id: entity_id.map(str::to_string),
            status,
            conditions_matched,
            actions_executed,
            execution_time_ms: started.elapsed().as_millis() as u64,
            entity_snapshot: entity.clone(),
            error_message,
            created_at: Utc::now(),
        }
    }

    async fn write_log(&self, log: RuleExecutionLog, summary: &mut TriggerSummary) {
        if let Err(e) = self.repository.create_log(log).await {
            warn!(workspace_id = %self.workspace_id, error = %e, "Failed to write rule execution log");
            summary
                .errors
                .push(format!("Failed to write execution log: {}", e));
        }
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("workspace_id", &self.workspace_id)
            .field("services", &self.services.is_some())
            .finish()
    }
}

/// Registry holding one engine per workspace.
///
/// Owned by the application's composition root and passed by handle to
/// whatever needs an engine; this preserves the one-engine-per-workspace
/// invariant without hidden global state. The interior mutex makes the
/// registry safe on preemptively-threaded runtimes.
#[derive(Default)]
pub struct EngineRegistry {
    engines: Mutex<HashMap<WorkspaceId, Arc<RuleEngine>>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the engine for a workspace, if one exists
    pub fn get(&self, workspace_id: &WorkspaceId) -> Option<Arc<RuleEngine>> {
        let engines = self.engines.lock().expect("engine registry poisoned");
        engines.get(workspace_id).cloned()
    }

    /// Fetch the engine for a workspace, creating and attaching one through
    /// `create` if absent.
    ///
    /// The factory runs only on a miss, so each workspace ends up with
    /// exactly one set of bus subscriptions.
    pub fn get_or_create<F>(
        &self,
        workspace_id: &WorkspaceId,
        bus: &EventBus,
        create: F,
    ) -> Arc<RuleEngine>
    where
        F: FnOnce() -> RuleEngine,
    {
        let mut engines = self.engines.lock().expect("engine registry poisoned");
        match engines.entry(workspace_id.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let engine = Arc::new(create());
                Arc::clone(&engine).attach(bus);
                entry.insert(Arc::clone(&engine));
                engine
            }
        }
    }

    /// Tear down a workspace's engine: unsubscribe all its listeners and
    /// drop it from the registry. A no-op for unknown workspaces.
    pub fn destroy(&self, workspace_id: &WorkspaceId) {
        let removed = {
            let mut engines = self.engines.lock().expect("engine registry poisoned");
            engines.remove(workspace_id)
        };

        if let Some(engine) = removed {
            engine.detach();
            info!(workspace_id = %workspace_id, "Rule engine destroyed");
        }
    }

    /// Number of live engines
    pub fn len(&self) -> usize {
        self.engines.lock().expect("engine registry poisoned").len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.len())
            .finish()
    }
}
