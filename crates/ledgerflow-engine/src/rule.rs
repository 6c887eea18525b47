/*!
 * Rule definitions for the LedgerFlow automation engine.
 *
 * This module defines the stored shape of an automation rule: the trigger it
 * subscribes to, the recursive condition tree evaluated against an entity
 * record, and the ordered list of actions executed on a match. It also
 * defines the execution-log record written once per rule per triggering
 * event.
 */
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerflow_core::types::{Entity, Value};

use crate::error::{Error, Result};

/// Rule identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(String);

impl RuleId {
    /// Create a new rule ID with a random UUID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a rule ID from a string
    pub fn from_string<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// Workspace (tenant) identifier.
///
/// Rules, execution logs, and engine instances are all scoped to exactly one
/// workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create a workspace ID from a string
    pub fn from_string<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for WorkspaceId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// The kinds of budgeting entities automation rules can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A ledger transaction
    Transaction,
    /// A bank or cash account
    Account,
    /// A payee
    Payee,
    /// A spending category
    Category,
    /// A recurring schedule
    Schedule,
    /// A budget envelope
    Budget,
}

impl EntityType {
    /// All entity types, in declaration order
    pub const ALL: [EntityType; 6] = [
        EntityType::Transaction,
        EntityType::Account,
        EntityType::Payee,
        EntityType::Category,
        EntityType::Schedule,
        EntityType::Budget,
    ];

    /// String form used as the event-bus key
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Transaction => "transaction",
            EntityType::Account => "account",
            EntityType::Payee => "payee",
            EntityType::Category => "category",
            EntityType::Schedule => "schedule",
            EntityType::Budget => "budget",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transaction" => Ok(EntityType::Transaction),
            "account" => Ok(EntityType::Account),
            "payee" => Ok(EntityType::Payee),
            "category" => Ok(EntityType::Category),
            "schedule" => Ok(EntityType::Schedule),
            "budget" => Ok(EntityType::Budget),
            other => Err(Error::validation(format!("Unknown entity type: {}", other))),
        }
    }
}

/// The `(entity type, event)` pair a rule subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Entity type the rule reacts to
    pub entity_type: EntityType,
    /// Event name, e.g. "created", "updated", "overspent", "due"
    pub event: String,
}

impl Trigger {
    /// Create a new trigger
    pub fn new<S: Into<String>>(entity_type: EntityType, event: S) -> Self {
        Self {
            entity_type,
            event: event.into(),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_type, self.event)
    }
}

/// Logical combinator for a condition group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    /// Every child condition must hold
    And,
    /// At least one child condition must hold
    Or,
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicOperator::And => write!(f, "AND"),
            LogicOperator::Or => write!(f, "OR"),
        }
    }
}

/// Comparison operator of a leaf condition.
///
/// The set is closed; operator strings that are not recognized deserialize
/// to [`ConditionOperator::Unknown`], which always evaluates to false rather
/// than aborting rule processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    /// Loose equality (case-insensitive for strings, coercing for numbers)
    Equals,
    /// Negated loose equality
    NotEquals,
    /// Case-insensitive substring test
    Contains,
    /// Case-insensitive prefix test
    StartsWith,
    /// Case-insensitive suffix test
    EndsWith,
    /// Case-insensitive regular expression match
    Matches,
    /// Numeric greater-than
    GreaterThan,
    /// Numeric less-than
    LessThan,
    /// Numeric greater-than-or-equal
    GreaterThanOrEquals,
    /// Numeric less-than-or-equal
    LessThanOrEquals,
    /// Numeric inclusive range test against `value` and `value2`
    Between,
    /// Membership in a list operand
    In,
    /// Category-hierarchy membership, resolved through an injected callback
    InGroup,
    /// Field is null or missing
    IsNull,
    /// Field is null, missing, blank, or an empty array
    IsEmpty,
    /// Date strictly before the operand date
    Before,
    /// Date strictly after the operand date
    After,
    /// Date within the next N days
    Within,
    /// UTC day-of-week membership (Sunday = 0)
    DayOfWeek,
    /// UTC day-of-month equality
    DayOfMonth,
    /// Unrecognized operator string; always evaluates false
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "notEquals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "startsWith",
            ConditionOperator::EndsWith => "endsWith",
            ConditionOperator::Matches => "matches",
            ConditionOperator::GreaterThan => "greaterThan",
            ConditionOperator::LessThan => "lessThan",
            ConditionOperator::GreaterThanOrEquals => "greaterThanOrEquals",
            ConditionOperator::LessThanOrEquals => "lessThanOrEquals",
            ConditionOperator::Between => "between",
            ConditionOperator::In => "in",
            ConditionOperator::InGroup => "inGroup",
            ConditionOperator::IsNull => "isNull",
            ConditionOperator::IsEmpty => "isEmpty",
            ConditionOperator::Before => "before",
            ConditionOperator::After => "after",
            ConditionOperator::Within => "within",
            ConditionOperator::DayOfWeek => "dayOfWeek",
            ConditionOperator::DayOfMonth => "dayOfMonth",
            ConditionOperator::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A leaf condition comparing one entity field against a configured value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dot-separated path into the entity record
    pub field: String,
    /// Comparison operator
    pub operator: ConditionOperator,
    /// Primary operand
    #[serde(default)]
    pub value: Value,
    /// Secondary operand, used by range operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
    /// Invert the result after operator evaluation
    #[serde(default)]
    pub negate: bool,
}

impl Condition {
    /// Create a new condition
    pub fn new<S: Into<String>, V: Into<Value>>(
        field: S,
        operator: ConditionOperator,
        value: V,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            value2: None,
            negate: false,
        }
    }

    /// Set the secondary operand
    pub fn with_value2<V: Into<Value>>(mut self, value2: V) -> Self {
        self.value2 = Some(value2.into());
        self
    }

    /// Invert the result of the condition
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }
}

/// One node of a condition tree: a leaf condition or a nested group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConditionNode {
    /// Leaf condition
    Condition(Condition),
    /// Nested AND/OR group
    Group(ConditionGroup),
}

impl From<Condition> for ConditionNode {
    fn from(c: Condition) -> Self {
        ConditionNode::Condition(c)
    }
}

impl From<ConditionGroup> for ConditionNode {
    fn from(g: ConditionGroup) -> Self {
        ConditionNode::Group(g)
    }
}

/// A recursive boolean expression over entity fields.
///
/// An empty group evaluates to true for both operators, which is what makes
/// "match everything" rules expressible.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    /// Logical combinator for the children
    pub operator: LogicOperator,
    /// Child conditions and nested groups
    #[serde(default)]
    pub conditions: Vec<ConditionNode>,
}

impl ConditionGroup {
    /// Create a group that requires every child to hold
    pub fn and(conditions: Vec<ConditionNode>) -> Self {
        Self {
            operator: LogicOperator::And,
            conditions,
        }
    }

    /// Create a group that requires at least one child to hold
    pub fn or(conditions: Vec<ConditionNode>) -> Self {
        Self {
            operator: LogicOperator::Or,
            conditions,
        }
    }

    /// Create an empty group that matches every entity
    pub fn match_all() -> Self {
        Self::and(Vec::new())
    }
}

impl Default for ConditionGroup {
    fn default() -> Self {
        Self::match_all()
    }
}

/// The kinds of side-effecting actions a rule can run.
///
/// Handlers are grouped by the entity type they mutate; `SendNotification`
/// is universal. Strings that are not recognized deserialize to
/// [`ActionKind::Unknown`], which produces a failed action result rather
/// than aborting the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Set a transaction's category
    SetCategory,
    /// Set a transaction's payee
    SetPayee,
    /// Set a transaction's notes
    SetNotes,
    /// Mark a transaction cleared or uncleared
    SetCleared,
    /// Patch fields on an account
    UpdateAccount,
    /// Close an account
    CloseAccount,
    /// Rename a payee
    RenamePayee,
    /// Merge a payee into another
    MergePayee,
    /// Create an alias for a payee
    CreatePayeeAlias,
    /// Patch fields on a category
    UpdateCategory,
    /// Move a category to a different group
    MoveCategoryToGroup,
    /// Patch fields on a schedule
    UpdateSchedule,
    /// Skip the next occurrence of a schedule
    SkipSchedule,
    /// Pause a schedule
    PauseSchedule,
    /// Resume a paused schedule
    ResumeSchedule,
    /// Patch fields on a budget
    UpdateBudget,
    /// Roll a budget's remaining balance forward
    RolloverBudget,
    /// Assign a transaction to a budget
    AssignTransaction,
    /// Send a templated notification
    SendNotification,
    /// Unrecognized action type; always fails
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::SetCategory => "setCategory",
            ActionKind::SetPayee => "setPayee",
            ActionKind::SetNotes => "setNotes",
            ActionKind::SetCleared => "setCleared",
            ActionKind::UpdateAccount => "updateAccount",
            ActionKind::CloseAccount => "closeAccount",
            ActionKind::RenamePayee => "renamePayee",
            ActionKind::MergePayee => "mergePayee",
            ActionKind::CreatePayeeAlias => "createPayeeAlias",
            ActionKind::UpdateCategory => "updateCategory",
            ActionKind::MoveCategoryToGroup => "moveCategoryToGroup",
            ActionKind::UpdateSchedule => "updateSchedule",
            ActionKind::SkipSchedule => "skipSchedule",
            ActionKind::PauseSchedule => "pauseSchedule",
            ActionKind::ResumeSchedule => "resumeSchedule",
            ActionKind::UpdateBudget => "updateBudget",
            ActionKind::RolloverBudget => "rolloverBudget",
            ActionKind::AssignTransaction => "assignTransaction",
            ActionKind::SendNotification => "sendNotification",
            ActionKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// One configured action within a rule.
///
/// Array order within [`Rule::actions`] is execution order and is
/// significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    /// Action identifier, unique within the rule
    pub id: String,
    /// Action type key
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Handler parameters
    #[serde(default)]
    pub params: HashMap<String, Value>,
    /// Whether a failure of this action lets the rest of the batch proceed
    #[serde(default)]
    pub continue_on_error: bool,
}

impl ActionConfig {
    /// Create a new action configuration
    pub fn new<S: Into<String>>(id: S, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: HashMap::new(),
            continue_on_error: false,
        }
    }

    /// Add a handler parameter
    pub fn with_param<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set whether a failure of this action halts the batch
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Before/after snapshot of one field, recorded for audit purposes only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the action
    pub from: Value,
    /// Value after the action
    pub to: Value,
}

/// Outcome of one executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// Identifier of the action configuration
    pub action_id: String,
    /// Action type key
    pub action_type: ActionKind,
    /// Whether the action succeeded
    pub success: bool,
    /// Failure message, when unsuccessful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Field-level before/after audit trail
    #[serde(default)]
    pub changes: HashMap<String, FieldChange>,
}

impl ActionResult {
    /// Build a successful result
    pub fn succeeded(config: &ActionConfig, changes: HashMap<String, FieldChange>) -> Self {
        Self {
            action_id: config.id.clone(),
            action_type: config.kind,
            success: true,
            error: None,
            changes,
        }
    }

    /// Build a failed result
    pub fn failed<S: Into<String>>(config: &ActionConfig, error: S) -> Self {
        Self {
            action_id: config.id.clone(),
            action_type: config.kind,
            success: false,
            error: Some(error.into()),
            changes: HashMap::new(),
        }
    }
}

/// Outcome classification of one rule-processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Conditions matched and every action succeeded
    Success,
    /// Conditions matched but at least one action failed
    Failed,
    /// Conditions did not match; no actions ran
    Skipped,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Audit record written exactly once per rule per triggering event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionLog {
    /// Log entry identifier
    pub id: String,
    /// Rule that was processed
    pub rule_id: RuleId,
    /// Workspace the rule belongs to
    pub workspace_id: WorkspaceId,
    /// Event name that triggered processing
    pub trigger_event: String,
    /// Entity type of the triggering entity
    pub entity_type: EntityType,
    /// Identifier of the triggering entity, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Outcome classification
    pub status: ExecutionStatus,
    /// Whether the condition tree matched
    pub conditions_matched: bool,
    /// Per-action outcomes, empty when skipped
    #[serde(default)]
    pub actions_executed: Vec<ActionResult>,
    /// Wall-clock duration of the pass in milliseconds
    pub execution_time_ms: u64,
    /// Snapshot of the entity record at trigger time
    pub entity_snapshot: Entity,
    /// Aggregated failure message, when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the log entry was created
    pub created_at: DateTime<Utc>,
}

/// A stored automation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Rule identifier
    pub id: RuleId,
    /// Workspace the rule belongs to
    pub workspace_id: WorkspaceId,
    /// Human-readable rule name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the rule participates in processing
    pub enabled: bool,
    /// Evaluation priority; higher runs first, ties keep insertion order
    pub priority: i32,
    /// Trigger the rule subscribes to
    pub trigger: Trigger,
    /// Condition tree evaluated against the entity
    pub conditions: ConditionGroup,
    /// Ordered action list executed on a match
    pub actions: Vec<ActionConfig>,
    /// Halt processing of lower-priority rules once this rule matches
    #[serde(default)]
    pub stop_on_match: bool,
    /// Disable the rule after one fully-successful match
    #[serde(default)]
    pub run_once: bool,
    /// How many times the rule has matched and executed
    #[serde(default)]
    pub times_triggered: u64,
    /// When the rule last matched and executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

/// Builder for rules
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    workspace_id: Option<WorkspaceId>,
    name: Option<String>,
    description: Option<String>,
    enabled: bool,
    priority: i32,
    trigger: Option<Trigger>,
    conditions: ConditionGroup,
    actions: Vec<ActionConfig>,
    stop_on_match: bool,
    run_once: bool,
}

impl RuleBuilder {
    /// Create a new rule builder
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Set the rule ID; a random UUID is generated when omitted
    pub fn with_id<I: Into<RuleId>>(mut self, id: I) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the workspace the rule belongs to
    pub fn with_workspace<W: Into<WorkspaceId>>(mut self, workspace_id: W) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Set the rule name
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the rule description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set whether the rule starts enabled
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the evaluation priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the trigger
    pub fn with_trigger<S: Into<String>>(mut self, entity_type: EntityType, event: S) -> Self {
        self.trigger = Some(Trigger::new(entity_type, event));
        self
    }

    /// Set the condition tree
    pub fn with_conditions(mut self, conditions: ConditionGroup) -> Self {
        self.conditions = conditions;
        self
    }

    /// Append an action
    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the stop-on-match policy
    pub fn stop_on_match(mut self, stop_on_match: bool) -> Self {
        self.stop_on_match = stop_on_match;
        self
    }

    /// Set the run-once policy
    pub fn run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Build the rule
    pub fn build(self) -> Result<Rule> {
        let workspace_id = self
            .workspace_id
            .ok_or_else(|| Error::validation("Rule workspace is required"))?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::validation("Rule name is required"))?;
        let trigger = self
            .trigger
            .ok_or_else(|| Error::validation("Rule trigger is required"))?;

        Ok(Rule {
            id: self.id.unwrap_or_default(),
            workspace_id,
            name,
            description: self.description,
            enabled: self.enabled,
            priority: self.priority,
            trigger,
            conditions: self.conditions,
            actions: self.actions,
            stop_on_match: self.stop_on_match,
            run_once: self.run_once,
            times_triggered: 0,
            last_triggered_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let rule = RuleBuilder::new()
            .with_workspace("ws-1")
            .with_name("Categorize groceries")
            .with_trigger(EntityType::Transaction, "created")
            .build()
            .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.priority, 0);
        assert!(!rule.stop_on_match);
        assert!(!rule.run_once);
        assert_eq!(rule.times_triggered, 0);
        assert!(rule.conditions.conditions.is_empty());
    }

    #[test]
    fn test_builder_requires_name_workspace_and_trigger() {
        assert!(RuleBuilder::new()
            .with_name("No workspace")
            .with_trigger(EntityType::Transaction, "created")
            .build()
            .is_err());

        assert!(RuleBuilder::new()
            .with_workspace("ws-1")
            .with_name("   ")
            .with_trigger(EntityType::Transaction, "created")
            .build()
            .is_err());

        assert!(RuleBuilder::new()
            .with_workspace("ws-1")
            .with_name("No trigger")
            .build()
            .is_err());
    }

    #[test]
    fn test_condition_tree_roundtrip() {
        let group = ConditionGroup::and(vec![
            Condition::new("amount", ConditionOperator::LessThan, -100).into(),
            ConditionGroup::or(vec![
                Condition::new("payeeName", ConditionOperator::Contains, "market").into(),
                Condition::new("notes", ConditionOperator::IsEmpty, Value::Null)
                    .negated()
                    .into(),
            ])
            .into(),
        ]);

        let json = serde_json::to_string(&group).unwrap();
        let parsed: ConditionGroup = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.operator, LogicOperator::And);
        assert_eq!(parsed.conditions.len(), 2);
        match &parsed.conditions[1] {
            ConditionNode::Group(inner) => {
                assert_eq!(inner.operator, LogicOperator::Or);
                assert_eq!(inner.conditions.len(), 2);
            }
            other => panic!("Expected nested group, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operator_deserializes() {
        let json = r#"{"field":"amount","operator":"frobnicate","value":1}"#;
        let condition: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(condition.operator, ConditionOperator::Unknown);
    }

    #[test]
    fn test_unknown_action_kind_deserializes() {
        let json = r#"{"id":"a1","type":"teleportFunds","params":{}}"#;
        let config: ActionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, ActionKind::Unknown);
        assert!(!config.continue_on_error);
    }

    #[test]
    fn test_trigger_display() {
        let trigger = Trigger::new(EntityType::Budget, "overspent");
        assert_eq!(trigger.to_string(), "budget.overspent");
    }

    #[test]
    fn test_entity_type_parse() {
        use std::str::FromStr;
        assert_eq!(
            EntityType::from_str("transaction").unwrap(),
            EntityType::Transaction
        );
        assert!(EntityType::from_str("starship").is_err());
    }
}
