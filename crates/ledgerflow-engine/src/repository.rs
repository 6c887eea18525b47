/*!
 * Rule persistence contracts for the LedgerFlow automation engine.
 *
 * The engine treats persistence as an opaque repository interface; the
 * storage layer is responsible for the transactional integrity of
 * individual reads and writes. An in-memory implementation backs tests and
 * standalone deployments.
 */
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::rule::{EntityType, Rule, RuleExecutionLog, RuleId, WorkspaceId};

/// Persistence contract the engine depends on.
///
/// `find_by_trigger` must return only enabled rules; the engine re-sorts by
/// priority itself. Execution logs are append-only and pruned by a
/// retention job.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Fetch the enabled rules subscribed to `(entity type, event)` in a
    /// workspace, in stable insertion order
    async fn find_by_trigger(
        &self,
        workspace_id: &WorkspaceId,
        entity_type: EntityType,
        event: &str,
    ) -> Result<Vec<Rule>>;

    /// Append an execution log entry
    async fn create_log(&self, log: RuleExecutionLog) -> Result<()>;

    /// Increment a rule's trigger counter and stamp its last-triggered time
    async fn update_stats(&self, rule_id: &RuleId) -> Result<()>;

    /// Disable a rule. Disabling an already-disabled rule is a no-op.
    async fn disable(&self, rule_id: &RuleId) -> Result<()>;

    /// Store a new rule
    async fn insert(&self, rule: Rule) -> Result<()>;

    /// Fetch a rule by id
    async fn get(&self, rule_id: &RuleId) -> Result<Option<Rule>>;

    /// Enable or disable a rule
    async fn set_enabled(&self, rule_id: &RuleId, enabled: bool) -> Result<()>;

    /// Fetch the most recent log entries for a rule, newest first
    async fn logs_for_rule(&self, rule_id: &RuleId, limit: usize) -> Result<Vec<RuleExecutionLog>>;

    /// Delete log entries older than the retention window, returning how
    /// many were removed
    async fn prune_logs_older_than(&self, days: u32) -> Result<usize>;
}

/// In-memory rule repository.
///
/// Rules are kept in insertion order so that priority ties break stably.
#[derive(Debug, Default)]
pub struct MemoryRuleRepository {
    rules: RwLock<Vec<Rule>>,
    logs: RwLock<Vec<RuleExecutionLog>>,
}

impl MemoryRuleRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Every log entry in creation order, for inspection and tests
    pub async fn all_logs(&self) -> Vec<RuleExecutionLog> {
        self.logs.read().await.clone()
    }

    /// Number of stored rules
    pub async fn rule_count(&self) -> usize {
        self.rules.read().await.len()
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn find_by_trigger(
        &self,
        workspace_id: &WorkspaceId,
        entity_type: EntityType,
        event: &str,
    ) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| {
                r.enabled
                    && r.workspace_id == *workspace_id
                    && r.trigger.entity_type == entity_type
                    && r.trigger.event == event
            })
            .cloned()
            .collect())
    }

    async fn create_log(&self, log: RuleExecutionLog) -> Result<()> {
        self.logs.write().await.push(log);
        Ok(())
    }

    async fn update_stats(&self, rule_id: &RuleId) -> Result<()> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == *rule_id)
            .ok_or_else(|| Error::not_found(format!("Rule {} not found", rule_id)))?;

        rule.times_triggered += 1;
        rule.last_triggered_at = Some(Utc::now());
        Ok(())
    }

    async fn disable(&self, rule_id: &RuleId) -> Result<()> {
        self.set_enabled(rule_id, false).await
    }

    async fn insert(&self, rule: Rule) -> Result<()> {
        let mut rules = self.rules.write().await;
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(Error::already_exists(format!(
                "Rule {} already exists",
                rule.id
            )));
        }
        rules.push(rule);
        Ok(())
    }

    async fn get(&self, rule_id: &RuleId) -> Result<Option<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules.iter().find(|r| r.id == *rule_id).cloned())
    }

    async fn set_enabled(&self, rule_id: &RuleId, enabled: bool) -> Result<()> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == *rule_id)
            .ok_or_else(|| Error::not_found(format!("Rule {} not found", rule_id)))?;

        rule.enabled = enabled;
        Ok(())
    }

    async fn logs_for_rule(&self, rule_id: &RuleId, limit: usize) -> Result<Vec<RuleExecutionLog>> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .rev()
            .filter(|l| l.rule_id == *rule_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn prune_logs_older_than(&self, days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let mut logs = self.logs.write().await;

        let before = logs.len();
        logs.retain(|l| l.created_at >= cutoff);
        let removed = before - logs.len();

        if removed > 0 {
            debug!(removed, days, "Pruned rule execution logs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ExecutionStatus, RuleBuilder};
    use ledgerflow_core::types::entity;

    fn sample_rule(name: &str, event: &str) -> Rule {
        RuleBuilder::new()
            .with_workspace("ws-1")
            .with_name(name)
            .with_trigger(EntityType::Transaction, event)
            .build()
            .unwrap()
    }

    fn sample_log(rule_id: &RuleId, age_days: i64) -> RuleExecutionLog {
        RuleExecutionLog {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.clone(),
            workspace_id: WorkspaceId::from_string("ws-1"),
            trigger_event: "created".to_string(),
            entity_type: EntityType::Transaction,
            entity_id: None,
            status: ExecutionStatus::Skipped,
            conditions_matched: false,
            actions_executed: Vec::new(),
            execution_time_ms: 0,
            entity_snapshot: entity([("amount", 1)]),
            error_message: None,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn test_find_by_trigger_filters_disabled_and_preserves_order() {
        let repo = MemoryRuleRepository::new();
        let first = sample_rule("first", "created");
        let second = sample_rule("second", "created");
        let mut off = sample_rule("off", "created");
        off.enabled = false;
        let other_event = sample_rule("other", "updated");

        repo.insert(first.clone()).await.unwrap();
        repo.insert(off).await.unwrap();
        repo.insert(second.clone()).await.unwrap();
        repo.insert(other_event).await.unwrap();

        let ws = WorkspaceId::from_string("ws-1");
        let found = repo
            .find_by_trigger(&ws, EntityType::Transaction, "created")
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[1].id, second.id);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let repo = MemoryRuleRepository::new();
        let rule = sample_rule("dup", "created");

        repo.insert(rule.clone()).await.unwrap();
        assert!(matches!(
            repo.insert(rule).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_update_stats() {
        let repo = MemoryRuleRepository::new();
        let rule = sample_rule("counted", "created");
        repo.insert(rule.clone()).await.unwrap();

        repo.update_stats(&rule.id).await.unwrap();
        repo.update_stats(&rule.id).await.unwrap();

        let stored = repo.get(&rule.id).await.unwrap().unwrap();
        assert_eq!(stored.times_triggered, 2);
        assert!(stored.last_triggered_at.is_some());
    }

    #[tokio::test]
    async fn test_disable_is_idempotent() {
        let repo = MemoryRuleRepository::new();
        let rule = sample_rule("once", "created");
        repo.insert(rule.clone()).await.unwrap();

        repo.disable(&rule.id).await.unwrap();
        repo.disable(&rule.id).await.unwrap();

        let stored = repo.get(&rule.id).await.unwrap().unwrap();
        assert!(!stored.enabled);
    }

    #[tokio::test]
    async fn test_logs_for_rule_newest_first() {
        let repo = MemoryRuleRepository::new();
        let rule_id = RuleId::from("r-1");

        repo.create_log(sample_log(&rule_id, 3)).await.unwrap();
        repo.create_log(sample_log(&rule_id, 2)).await.unwrap();
        repo.create_log(sample_log(&RuleId::from("r-2"), 1))
            .await
            .unwrap();

        let logs = repo.logs_for_rule(&rule_id, 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].created_at > logs[1].created_at);

        let limited = repo.logs_for_rule(&rule_id, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_logs_older_than() {
        let repo = MemoryRuleRepository::new();
        let rule_id = RuleId::from("r-1");

        repo.create_log(sample_log(&rule_id, 120)).await.unwrap();
        repo.create_log(sample_log(&rule_id, 45)).await.unwrap();
        repo.create_log(sample_log(&rule_id, 1)).await.unwrap();

        let removed = repo.prune_logs_older_than(90).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.all_logs().await.len(), 2);

        // Nothing further to prune
        assert_eq!(repo.prune_logs_older_than(90).await.unwrap(), 0);
    }
}
