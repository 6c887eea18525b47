use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ledgerflow_core::event::{EventBus, EventPayload};
use ledgerflow_core::types::{entity, Entity, Value};
use ledgerflow_core::utils::with_timeout;

use ledgerflow_engine::action::{NotificationService, ServiceCapabilities, TransactionService};
use ledgerflow_engine::engine::{EngineRegistry, RuleEngine, TriggerRequest};
use ledgerflow_engine::repository::{MemoryRuleRepository, RuleRepository};
use ledgerflow_engine::rule::{
    ActionConfig, ActionKind, Condition, ConditionGroup, ConditionOperator, EntityType,
    RuleBuilder, WorkspaceId,
};

/// Prints the patches it receives instead of writing to a database
struct ConsoleTransactions;

#[async_trait]
impl TransactionService for ConsoleTransactions {
    async fn update(&self, id: &str, patch: Entity) -> ledgerflow_engine::Result<()> {
        println!("  -> transaction {} patched: {:?}", id, patch);
        Ok(())
    }
}

struct ConsoleNotifications;

#[async_trait]
impl NotificationService for ConsoleNotifications {
    async fn send(
        &self,
        workspace_id: &WorkspaceId,
        title: &str,
        message: &str,
    ) -> ledgerflow_engine::Result<()> {
        println!("  -> notify [{}] {}: {}", workspace_id, title, message);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ledgerflow_core::logging::init_with_filter("info")?;

    let repository = Arc::new(MemoryRuleRepository::new());
    let workspace = WorkspaceId::from_string("demo-household");

    // A rule that categorizes large purchases and pings the household
    let rule = RuleBuilder::new()
        .with_workspace(workspace.clone())
        .with_name("Flag large purchases")
        .with_priority(10)
        .with_trigger(EntityType::Transaction, "created")
        .with_conditions(ConditionGroup::and(vec![Condition::new(
            "amount",
            ConditionOperator::LessThan,
            -100,
        )
        .into()]))
        .with_action(ActionConfig::new("categorize", ActionKind::SetCategory).with_param("categoryId", 42))
        .with_action(
            ActionConfig::new("notify", ActionKind::SendNotification)
                .with_param("title", "Large purchase")
                .with_param("message", "{{payeeName}} charged {{amount}}"),
        )
        .build()?;
    repository.insert(rule.clone()).await?;

    let services = Arc::new(
        ServiceCapabilities::new()
            .with_transactions(Arc::new(ConsoleTransactions))
            .with_notifications(Arc::new(ConsoleNotifications)),
    );

    let bus = EventBus::new();
    let registry = EngineRegistry::new();
    let repo_for_engine = repository.clone();
    let services_for_engine = services.clone();
    let engine = registry.get_or_create(&workspace, &bus, move || {
        RuleEngine::new("demo-household", repo_for_engine).with_services(services_for_engine)
    });

    let purchase = entity([
        ("amount", Value::from(-150)),
        ("payeeName", Value::from("Corner Market")),
        ("categoryId", Value::Null),
    ]);

    // Dry-run the rule first, the way the rule editor previews it
    let report = engine.test_rule(&rule, &purchase).await;
    println!(
        "dry run: matched={} actions={}",
        report.matched,
        report.action_results.len()
    );

    // Path one: a producing service awaits the synchronous trigger
    let summary = with_timeout(
        Duration::from_secs(5),
        async {
            Ok(engine
                .trigger(
                    TriggerRequest::new(EntityType::Transaction, "created", purchase.clone())
                        .with_entity_id("tx-1001")
                        .with_services(services.clone()),
                )
                .await)
        },
    )
    .await?;
    println!(
        "trigger: evaluated={} matched={} actions={} errors={}",
        summary.rules_evaluated,
        summary.rules_matched,
        summary.actions_executed,
        summary.errors.len()
    );

    // Path two: fire-and-forget through the event bus
    bus.emit(
        "transaction",
        "created",
        EventPayload {
            entity_id: Some("tx-1002".to_string()),
            entity: purchase,
            previous_state: None,
            workspace_id: "demo-household".to_string(),
        },
    )
    .await;

    for log in repository.logs_for_rule(&rule.id, 10).await? {
        println!(
            "log: status={} matched={} actions={} in {}ms",
            log.status,
            log.conditions_matched,
            log.actions_executed.len(),
            log.execution_time_ms
        );
    }

    registry.destroy(&workspace);
    Ok(())
}
