/*!
 * LedgerFlow Engine
 *
 * This crate provides the automation rule engine for LedgerFlow budgeting
 * systems: rule definitions, condition evaluation, action execution, rule
 * persistence contracts, and the per-workspace engine registry.
 */

#![warn(missing_docs)]

// Re-export core types for convenience
pub use ledgerflow_core::types::{Entity, Value};

pub mod action;
pub mod condition;
pub mod engine;
pub mod error;
pub mod repository;
pub mod rule;

// Re-export main types for convenience
pub use action::{
    ActionExecutor, ExecutionContext, NotificationService, ServiceCapabilities,
    TransactionService,
};
pub use condition::{ConditionEvaluator, EvalContext, InGroupFn};
pub use engine::{EngineRegistry, RuleEngine, RuleTestReport, TriggerRequest, TriggerSummary};
pub use error::{Error, Result};
pub use repository::{MemoryRuleRepository, RuleRepository};
pub use rule::{
    ActionConfig, ActionKind, ActionResult, Condition, ConditionGroup, ConditionNode,
    ConditionOperator, EntityType, ExecutionStatus, LogicOperator, Rule, RuleBuilder,
    RuleExecutionLog, RuleId, Trigger, WorkspaceId,
};

/// LedgerFlow engine crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine
pub fn init() -> Result<()> {
    tracing::info!("LedgerFlow Engine {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
