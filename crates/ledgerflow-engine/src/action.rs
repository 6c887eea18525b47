/*!
 * Action execution for the LedgerFlow automation engine.
 *
 * This module applies a rule's configured action list to an entity through a
 * bag of optional, injected service capabilities. Actions run strictly in
 * array order; a failure halts the batch unless the failing action opted
 * into `continue_on_error`. Every failure mode (unknown action type,
 * entity-type mismatch, absent capability, handler error) is reported as a
 * failed [`ActionResult`], never a panic or propagated error.
 */
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use ledgerflow_core::types::{Entity, Value};

use crate::error::Result;
use crate::rule::{ActionConfig, ActionKind, ActionResult, EntityType, FieldChange, WorkspaceId};

/// Mutations the executor can apply to transactions
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Patch fields on a transaction
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;
}

/// Mutations the executor can apply to accounts
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Patch fields on an account
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;

    /// Close an account
    async fn close(&self, id: &str) -> Result<()>;
}

/// Mutations the executor can apply to payees
#[async_trait]
pub trait PayeeService: Send + Sync {
    /// Patch fields on a payee
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;

    /// Merge a payee into another payee
    async fn merge(&self, source_id: &str, target_id: &str) -> Result<()>;

    /// Register an alias for a payee
    async fn create_alias(&self, id: &str, alias: &str) -> Result<()>;
}

/// Mutations the executor can apply to categories
#[async_trait]
pub trait CategoryService: Send + Sync {
    /// Patch fields on a category
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;

    /// Move a category to another group
    async fn move_to_group(&self, id: &str, group_id: &str) -> Result<()>;
}

/// Mutations the executor can apply to schedules
#[async_trait]
pub trait ScheduleService: Send + Sync {
    /// Patch fields on a schedule
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;

    /// Skip the next occurrence
    async fn skip(&self, id: &str) -> Result<()>;

    /// Pause the schedule
    async fn pause(&self, id: &str) -> Result<()>;

    /// Resume the schedule
    async fn resume(&self, id: &str) -> Result<()>;
}

/// Mutations the executor can apply to budgets
#[async_trait]
pub trait BudgetService: Send + Sync {
    /// Patch fields on a budget
    async fn update(&self, id: &str, patch: Entity) -> Result<()>;

    /// Roll the remaining balance forward
    async fn rollover(&self, id: &str) -> Result<()>;

    /// Assign a transaction to the budget
    async fn assign_transaction(&self, budget_id: &str, transaction_id: &str) -> Result<()>;
}

/// Outbound notification delivery
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Send a notification to the workspace's owner
    async fn send(&self, workspace_id: &WorkspaceId, title: &str, message: &str) -> Result<()>;
}

/// The bag of optional per-entity-type service capabilities.
///
/// Every capability may be absent; handlers treat absence as a failed
/// action result, not an error.
#[derive(Clone, Default)]
pub struct ServiceCapabilities {
    /// Transaction mutations
    pub transactions: Option<Arc<dyn TransactionService>>,
    /// Account mutations
    pub accounts: Option<Arc<dyn AccountService>>,
    /// Payee mutations
    pub payees: Option<Arc<dyn PayeeService>>,
    /// Category mutations
    pub categories: Option<Arc<dyn CategoryService>>,
    /// Schedule mutations
    pub schedules: Option<Arc<dyn ScheduleService>>,
    /// Budget mutations
    pub budgets: Option<Arc<dyn BudgetService>>,
    /// Notification delivery
    pub notifications: Option<Arc<dyn NotificationService>>,
}

impl ServiceCapabilities {
    /// Create an empty capability bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the transaction capability
    pub fn with_transactions(mut self, service: Arc<dyn TransactionService>) -> Self {
        self.transactions = Some(service);
        self
    }

    /// Supply the account capability
    pub fn with_accounts(mut self, service: Arc<dyn AccountService>) -> Self {
        self.accounts = Some(service);
        self
    }

    /// Supply the payee capability
    pub fn with_payees(mut self, service: Arc<dyn PayeeService>) -> Self {
        self.payees = Some(service);
        self
    }

    /// Supply the category capability
    pub fn with_categories(mut self, service: Arc<dyn CategoryService>) -> Self {
        self.categories = Some(service);
        self
    }

    /// Supply the schedule capability
    pub fn with_schedules(mut self, service: Arc<dyn ScheduleService>) -> Self {
        self.schedules = Some(service);
        self
    }

    /// Supply the budget capability
    pub fn with_budgets(mut self, service: Arc<dyn BudgetService>) -> Self {
        self.budgets = Some(service);
        self
    }

    /// Supply the notification capability
    pub fn with_notifications(mut self, service: Arc<dyn NotificationService>) -> Self {
        self.notifications = Some(service);
        self
    }
}

impl std::fmt::Debug for ServiceCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCapabilities")
            .field("transactions", &self.transactions.is_some())
            .field("accounts", &self.accounts.is_some())
            .field("payees", &self.payees.is_some())
            .field("categories", &self.categories.is_some())
            .field("schedules", &self.schedules.is_some())
            .field("budgets", &self.budgets.is_some())
            .field("notifications", &self.notifications.is_some())
            .finish()
    }
}

/// Context for one action batch
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Workspace the batch runs in
    pub workspace_id: WorkspaceId,
    /// Report intended effects without invoking any handler
    pub dry_run: bool,
    /// Injected capabilities; `None` means the caller did not opt into side
    /// effects, and every action fails with "services not provided"
    pub services: Option<Arc<ServiceCapabilities>>,
}

impl ExecutionContext {
    /// Create a live execution context
    pub fn new<W: Into<WorkspaceId>>(
        workspace_id: W,
        services: Option<Arc<ServiceCapabilities>>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            dry_run: false,
            services,
        }
    }

    /// Create a dry-run context
    pub fn dry_run<W: Into<WorkspaceId>>(workspace_id: W) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            dry_run: true,
            services: None,
        }
    }
}

/// The entity types each action kind may target
pub fn allowed_entity_types(kind: ActionKind) -> &'static [EntityType] {
    match kind {
        ActionKind::SetCategory
        | ActionKind::SetPayee
        | ActionKind::SetNotes
        | ActionKind::SetCleared => &[EntityType::Transaction],
        ActionKind::UpdateAccount | ActionKind::CloseAccount => &[EntityType::Account],
        ActionKind::RenamePayee | ActionKind::MergePayee | ActionKind::CreatePayeeAlias => {
            &[EntityType::Payee]
        }
        ActionKind::UpdateCategory | ActionKind::MoveCategoryToGroup => &[EntityType::Category],
        ActionKind::UpdateSchedule
        | ActionKind::SkipSchedule
        | ActionKind::PauseSchedule
        | ActionKind::ResumeSchedule => &[EntityType::Schedule],
        ActionKind::UpdateBudget | ActionKind::RolloverBudget | ActionKind::AssignTransaction => {
            &[EntityType::Budget]
        }
        ActionKind::SendNotification => &EntityType::ALL,
        ActionKind::Unknown => &[],
    }
}

/// Interpolate `{{field}}` placeholders against an entity record.
///
/// Placeholders may use dotted paths. Unresolved placeholders are left
/// literally in the output.
pub fn render_template(template: &str, entity: &Entity) -> String {
    // The pattern is static, so compilation cannot fail
    let re = Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("valid placeholder pattern");
    re.replace_all(template, |caps: &regex::Captures<'_>| {
        match crate::condition::get_field_value(entity, &caps[1]) {
            Some(value) => value.render(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Executes a rule's action list against an entity
#[derive(Debug, Default)]
pub struct ActionExecutor;

impl ActionExecutor {
    /// Create a new action executor
    pub fn new() -> Self {
        Self
    }

    /// Execute a batch of actions strictly in array order.
    ///
    /// Returns one result per action that was reached; a failing action with
    /// `continue_on_error` unset halts the batch, so later actions produce
    /// no result at all.
    pub async fn execute_actions(
        &self,
        actions: &[ActionConfig],
        entity: &Entity,
        entity_type: EntityType,
        entity_id: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());

        for config in actions {
            let result = self
                .execute_one(config, entity, entity_type, entity_id, ctx)
                .await;
            let halt = !result.success && !config.continue_on_error;
            results.push(result);

            if halt {
                debug!(
                    action = %config.kind,
                    "Action failed without continue_on_error; halting batch"
                );
                break;
            }
        }

        results
    }

    async fn execute_one(
        &self,
        config: &ActionConfig,
        entity: &Entity,
        entity_type: EntityType,
        entity_id: Option<&str>,
        ctx: &ExecutionContext,
    ) -> ActionResult {
        if config.kind == ActionKind::Unknown {
            warn!(action_id = %config.id, "Unknown action type");
            return ActionResult::failed(config, "Unknown action type");
        }

        if !allowed_entity_types(config.kind).contains(&entity_type) {
            return ActionResult::failed(
                config,
                format!(
                    "Action '{}' is not applicable to entity type '{}'",
                    config.kind, entity_type
                ),
            );
        }

        // Dry runs report the intended changes without touching any service
        if ctx.dry_run {
            return ActionResult::succeeded(config, Self::prospective_changes(config, entity));
        }

        let Some(services) = ctx.services.as_deref() else {
            return ActionResult::failed(config, "Services not provided");
        };

        match self
            .run_handler(config, entity, entity_id, services, &ctx.workspace_id)
            .await
        {
            Ok(changes) => ActionResult::succeeded(config, changes),
            Err(message) => ActionResult::failed(config, message),
        }
    }

    /// The before/after entries an action's parameters imply, without
    /// applying anything
    fn prospective_changes(config: &ActionConfig, entity: &Entity) -> HashMap<String, FieldChange> {
        config
            .params
            .iter()
            .map(|(field, to)| {
                let from = entity.get(field).cloned().unwrap_or(Value::Null);
                (
                    field.clone(),
                    FieldChange {
                        from,
                        to: to.clone(),
                    },
                )
            })
            .collect()
    }

    async fn run_handler(
        &self,
        config: &ActionConfig,
        entity: &Entity,
        entity_id: Option<&str>,
        services: &ServiceCapabilities,
        workspace_id: &WorkspaceId,
    ) -> std::result::Result<HashMap<String, FieldChange>, String> {
        match config.kind {
            ActionKind::SetCategory => {
                self.patch_transaction(config, entity, entity_id, services, "categoryId")
                    .await
            }
            ActionKind::SetPayee => {
                self.patch_transaction(config, entity, entity_id, services, "payeeId")
                    .await
            }
            ActionKind::SetNotes => {
                self.patch_transaction(config, entity, entity_id, services, "notes")
                    .await
            }
            ActionKind::SetCleared => {
                self.patch_transaction(config, entity, entity_id, services, "cleared")
                    .await
            }
            ActionKind::UpdateAccount => {
                let accounts = services
                    .accounts
                    .as_deref()
                    .ok_or("Account capability not available")?;
                let id = require_entity_id(entity_id)?;
                let (patch, changes) = patch_from_params(config, entity);
                accounts.update(id, patch).await.map_err(stringify)?;
                Ok(changes)
            }
            ActionKind::CloseAccount => {
                let accounts = services
                    .accounts
                    .as_deref()
                    .ok_or("Account capability not available")?;
                let id = require_entity_id(entity_id)?;
                accounts.close(id).await.map_err(stringify)?;
                Ok(single_change(entity, "closed", Value::Bool(true)))
            }
            ActionKind::RenamePayee => {
                let payees = services
                    .payees
                    .as_deref()
                    .ok_or("Payee capability not available")?;
                let id = require_entity_id(entity_id)?;
                let name = require_param(config, "name")?;
                payees
                    .update(id, [("name".to_string(), name.clone())].into_iter().collect())
                    .await
                    .map_err(stringify)?;
                Ok(single_change(entity, "name", name))
            }
            ActionKind::MergePayee => {
                let payees = services
                    .payees
                    .as_deref()
                    .ok_or("Payee capability not available")?;
                let id = require_entity_id(entity_id)?;
                let target = require_param_str(config, "targetPayeeId")?;
                payees.merge(id, &target).await.map_err(stringify)?;
                Ok(single_change(entity, "mergedInto", Value::from(target)))
            }
            ActionKind::CreatePayeeAlias => {
                let payees = services
                    .payees
                    .as_deref()
                    .ok_or("Payee capability not available")?;
                let id = require_entity_id(entity_id)?;
                let alias = require_param_str(config, "alias")?;
                payees.create_alias(id, &alias).await.map_err(stringify)?;
                Ok(single_change(entity, "alias", Value::from(alias)))
            }
            ActionKind::UpdateCategory => {
                let categories = services
                    .categories
                    .as_deref()
                    .ok_or("Category capability not available")?;
                let id = require_entity_id(entity_id)?;
                let (patch, changes) = patch_from_params(config, entity);
                categories.update(id, patch).await.map_err(stringify)?;
                Ok(changes)
            }
            ActionKind::MoveCategoryToGroup => {
                let categories = services
                    .categories
                    .as_deref()
                    .ok_or("Category capability not available")?;
                let id = require_entity_id(entity_id)?;
                let group = require_param_str(config, "groupId")?;
                categories.move_to_group(id, &group).await.map_err(stringify)?;
                Ok(single_change(entity, "groupId", Value::from(group)))
            }
            ActionKind::UpdateSchedule => {
                let schedules = services
                    .schedules
                    .as_deref()
                    .ok_or("Schedule capability not available")?;
                let id = require_entity_id(entity_id)?;
                let (patch, changes) = patch_from_params(config, entity);
                schedules.update(id, patch).await.map_err(stringify)?;
                Ok(changes)
            }
            ActionKind::SkipSchedule => {
                let schedules = services
                    .schedules
                    .as_deref()
                    .ok_or("Schedule capability not available")?;
                let id = require_entity_id(entity_id)?;
                schedules.skip(id).await.map_err(stringify)?;
                Ok(single_change(entity, "status", Value::from("skipped")))
            }
            ActionKind::PauseSchedule => {
                let schedules = services
                    .schedules
                    .as_deref()
                    .ok_or("Schedule capability not available")?;
                let id = require_entity_id(entity_id)?;
                schedules.pause(id).await.map_err(stringify)?;
                Ok(single_change(entity, "status", Value::from("paused")))
            }
            ActionKind::ResumeSchedule => {
                let schedules = services
                    .schedules
                    .as_deref()
                    .ok_or("Schedule capability not available")?;
                let id = require_entity_id(entity_id)?;
                schedules.resume(id).await.map_err(stringify)?;
                Ok(single_change(entity, "status", Value::from("active")))
            }
            ActionKind::UpdateBudget => {
                let budgets = services
                    .budgets
                    .as_deref()
                    .ok_or("Budget capability not available")?;
                let id = require_entity_id(entity_id)?;
                let (patch, changes) = patch_from_params(config, entity);
                budgets.update(id, patch).await.map_err(stringify)?;
                Ok(changes)
            }
            ActionKind::RolloverBudget => {
                let budgets = services
                    .budgets
                    .as_deref()
                    .ok_or("Budget capability not available")?;
                let id = require_entity_id(entity_id)?;
                budgets.rollover(id).await.map_err(stringify)?;
                Ok(single_change(entity, "rolledOver", Value::Bool(true)))
            }
            ActionKind::AssignTransaction => {
                let budgets = services
                    .budgets
                    .as_deref()
                    .ok_or("Budget capability not available")?;
                let id = require_entity_id(entity_id)?;
                let transaction_id = require_param_str(config, "transactionId")?;
                budgets
                    .assign_transaction(id, &transaction_id)
                    .await
                    .map_err(stringify)?;
                Ok(single_change(
                    entity,
                    "assignedTransactionId",
                    Value::from(transaction_id),
                ))
            }
            ActionKind::SendNotification => {
                let notifications = services
                    .notifications
                    .as_deref()
                    .ok_or("Notification capability not available")?;
                let title = require_param_str(config, "title")?;
                let message = require_param_str(config, "message")?;

                let title = render_template(&title, entity);
                let message = render_template(&message, entity);
                notifications
                    .send(workspace_id, &title, &message)
                    .await
                    .map_err(stringify)?;
                Ok(HashMap::new())
            }
            ActionKind::Unknown => Err("Unknown action type".to_string()),
        }
    }

    /// Shared handler for the single-field transaction mutations
    async fn patch_transaction(
        &self,
        config: &ActionConfig,
        entity: &Entity,
        entity_id: Option<&str>,
        services: &ServiceCapabilities,
        field: &str,
    ) -> std::result::Result<HashMap<String, FieldChange>, String> {
        let transactions = services
            .transactions
            .as_deref()
            .ok_or("Transaction capability not available")?;
        let id = require_entity_id(entity_id)?;
        let value = require_param(config, field)?;

        transactions
            .update(id, [(field.to_string(), value.clone())].into_iter().collect())
            .await
            .map_err(stringify)?;

        Ok(single_change(entity, field, value))
    }
}

fn stringify(e: crate::error::Error) -> String {
    e.to_string()
}

fn require_entity_id(entity_id: Option<&str>) -> std::result::Result<&str, String> {
    entity_id.ok_or_else(|| "Entity id not available".to_string())
}

fn require_param(config: &ActionConfig, key: &str) -> std::result::Result<Value, String> {
    config
        .params
        .get(key)
        .cloned()
        .ok_or_else(|| format!("Missing required parameter '{}'", key))
}

fn require_param_str(config: &ActionConfig, key: &str) -> std::result::Result<String, String> {
    match require_param(config, key)? {
        Value::String(s) => Ok(s),
        other => Err(format!(
            "Parameter '{}' must be a string, got {:?}",
            key, other
        )),
    }
}

fn single_change(entity: &Entity, field: &str, to: Value) -> HashMap<String, FieldChange> {
    let from = entity.get(field).cloned().unwrap_or(Value::Null);
    [(field.to_string(), FieldChange { from, to })]
        .into_iter()
        .collect()
}

fn patch_from_params(
    config: &ActionConfig,
    entity: &Entity,
) -> (Entity, HashMap<String, FieldChange>) {
    let patch: Entity = config
        .params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let changes = config
        .params
        .iter()
        .map(|(field, to)| {
            let from = entity.get(field).cloned().unwrap_or(Value::Null);
            (
                field.clone(),
                FieldChange {
                    from,
                    to: to.clone(),
                },
            )
        })
        .collect();
    (patch, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ledgerflow_core::types::entity;
    use std::sync::Mutex;

    /// Transaction service that records every patch it receives
    #[derive(Default)]
    struct RecordingTransactions {
        calls: Mutex<Vec<(String, Entity)>>,
    }

    #[async_trait]
    impl TransactionService for RecordingTransactions {
        async fn update(&self, id: &str, patch: Entity) -> Result<()> {
            self.calls.lock().unwrap().push((id.to_string(), patch));
            Ok(())
        }
    }

    /// Transaction service that always fails
    struct FailingTransactions;

    #[async_trait]
    impl TransactionService for FailingTransactions {
        async fn update(&self, _id: &str, _patch: Entity) -> Result<()> {
            Err(Error::service("database unavailable"))
        }
    }

    #[derive(Default)]
    struct RecordingNotifications {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl NotificationService for RecordingNotifications {
        async fn send(&self, _workspace_id: &WorkspaceId, title: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn live_ctx(services: ServiceCapabilities) -> ExecutionContext {
        ExecutionContext::new("ws-1", Some(Arc::new(services)))
    }

    #[tokio::test]
    async fn test_set_category_records_change() {
        let transactions = Arc::new(RecordingTransactions::default());
        let ctx = live_ctx(ServiceCapabilities::new().with_transactions(transactions.clone()));
        let e = entity([("amount", Value::from(-150)), ("categoryId", Value::Null)]);

        let actions = vec![ActionConfig::new("a1", ActionKind::SetCategory)
            .with_param("categoryId", 42)];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        let change = &results[0].changes["categoryId"];
        assert_eq!(change.from, Value::Null);
        assert_eq!(change.to, Value::Integer(42));

        let calls = transactions.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "tx-1");
        assert_eq!(calls[0].1.get("categoryId"), Some(&Value::Integer(42)));
    }

    #[tokio::test]
    async fn test_failure_halts_batch_by_default() {
        let ctx = live_ctx(
            ServiceCapabilities::new().with_transactions(Arc::new(FailingTransactions)),
        );
        let e = entity([("amount", -1)]);

        let actions = vec![
            ActionConfig::new("a", ActionKind::SetCategory).with_param("categoryId", 1),
            ActionConfig::new("b", ActionKind::SetNotes).with_param("notes", "x"),
            ActionConfig::new("c", ActionKind::SetCleared).with_param("cleared", true),
        ];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        // Only A ran; B and C were never reached
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("database unavailable"));
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_full_batch() {
        let ctx = live_ctx(
            ServiceCapabilities::new().with_transactions(Arc::new(FailingTransactions)),
        );
        let e = entity([("amount", -1)]);

        let actions = vec![
            ActionConfig::new("a", ActionKind::SetCategory)
                .with_param("categoryId", 1)
                .continue_on_error(true),
            ActionConfig::new("b", ActionKind::SetNotes)
                .with_param("notes", "x")
                .continue_on_error(true),
            ActionConfig::new("c", ActionKind::SetCleared)
                .with_param("cleared", true)
                .continue_on_error(true),
        ];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn test_entity_type_mismatch_fails_without_handler() {
        let transactions = Arc::new(RecordingTransactions::default());
        let ctx = live_ctx(ServiceCapabilities::new().with_transactions(transactions.clone()));
        let e = entity([("name", "Savings")]);

        let actions =
            vec![ActionConfig::new("a1", ActionKind::SetCategory).with_param("categoryId", 1)];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Account, Some("acct-1"), &ctx)
            .await;

        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("not applicable"));
        assert!(transactions.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_capability_fails_gracefully() {
        let ctx = live_ctx(ServiceCapabilities::new());
        let e = entity([("amount", -1)]);

        let actions =
            vec![ActionConfig::new("a1", ActionKind::SetCategory).with_param("categoryId", 1)];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert!(!results[0].success);
        assert_eq!(
            results[0].error.as_deref(),
            Some("Transaction capability not available")
        );
    }

    #[tokio::test]
    async fn test_services_not_provided() {
        let ctx = ExecutionContext::new("ws-1", None);
        let e = entity([("amount", -1)]);

        let actions =
            vec![ActionConfig::new("a1", ActionKind::SetCategory).with_param("categoryId", 1)];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Services not provided"));
    }

    #[tokio::test]
    async fn test_dry_run_reports_changes_without_side_effects() {
        let ctx = ExecutionContext::dry_run("ws-1");
        let e = entity([("categoryId", Value::Null)]);

        let actions = vec![
            ActionConfig::new("a1", ActionKind::SetCategory).with_param("categoryId", 42),
            ActionConfig::new("a2", ActionKind::SetNotes).with_param("notes", "tagged"),
        ];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].changes["categoryId"].to, Value::Integer(42));
    }

    #[tokio::test]
    async fn test_dry_run_still_rejects_unknown_and_mismatched() {
        let ctx = ExecutionContext::dry_run("ws-1");
        let e = entity([("amount", -1)]);

        let unknown: ActionConfig =
            serde_json::from_str(r#"{"id":"a1","type":"teleportFunds"}"#).unwrap();
        let mismatched =
            ActionConfig::new("a2", ActionKind::CloseAccount);

        let results = ActionExecutor::new()
            .execute_actions(
                &[unknown, mismatched],
                &e,
                EntityType::Transaction,
                Some("tx-1"),
                &ctx,
            )
            .await;

        // Unknown halts the batch (no continue_on_error)
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn test_missing_entity_id() {
        let ctx = live_ctx(
            ServiceCapabilities::new().with_transactions(Arc::new(RecordingTransactions::default())),
        );
        let e = entity([("amount", -1)]);

        let actions =
            vec![ActionConfig::new("a1", ActionKind::SetCategory).with_param("categoryId", 1)];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, None, &ctx)
            .await;

        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Entity id not available"));
    }

    #[tokio::test]
    async fn test_notification_template_interpolation() {
        let notifications = Arc::new(RecordingNotifications::default());
        let ctx = live_ctx(ServiceCapabilities::new().with_notifications(notifications.clone()));
        let e = entity([
            ("payeeName", Value::from("Corner Market")),
            ("amount", Value::from(-150)),
        ]);

        let actions = vec![ActionConfig::new("n1", ActionKind::SendNotification)
            .with_param("title", "Large purchase")
            .with_param(
                "message",
                "{{payeeName}} charged {{amount}} ({{missing.field}})",
            )];
        let results = ActionExecutor::new()
            .execute_actions(&actions, &e, EntityType::Transaction, Some("tx-1"), &ctx)
            .await;

        assert!(results[0].success);
        let sent = notifications.sent.lock().unwrap();
        assert_eq!(sent[0].0, "Large purchase");
        // Unresolved placeholders stay literal
        assert_eq!(sent[0].1, "Corner Market charged -150 ({{missing.field}})");
    }

    #[test]
    fn test_allowed_entity_types_table() {
        assert_eq!(
            allowed_entity_types(ActionKind::SetCategory),
            &[EntityType::Transaction]
        );
        assert_eq!(allowed_entity_types(ActionKind::SendNotification).len(), 6);
        assert!(allowed_entity_types(ActionKind::Unknown).is_empty());
    }

    #[test]
    fn test_render_template_dotted_paths() {
        let mut details = std::collections::HashMap::new();
        details.insert("city".to_string(), Value::from("Lisbon"));
        let e = entity([("location", Value::Object(details))]);

        assert_eq!(render_template("from {{ location.city }}", &e), "from Lisbon");
        assert_eq!(render_template("{{nope}}", &e), "{{nope}}");
    }
}
