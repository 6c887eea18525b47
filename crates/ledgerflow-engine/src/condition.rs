/*!
 * Condition evaluation for the LedgerFlow automation engine.
 *
 * This module implements the recursive, side-effect-free evaluator that
 * decides whether a rule's condition tree matches an entity record. A
 * malformed condition never aborts rule processing: unknown operators,
 * bad regular expressions, and type mismatches all evaluate to false with
 * a diagnostic warning.
 */
use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use regex::RegexBuilder;
use tracing::{debug, warn};

use ledgerflow_core::types::{Entity, Value};

use crate::rule::{Condition, ConditionGroup, ConditionNode, ConditionOperator, LogicOperator};

/// Callback that answers category-hierarchy membership questions.
///
/// Receives the field value (a category id) and the condition operand (a
/// group id) and reports whether the category belongs to the group.
pub type InGroupFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Context supplied to condition evaluation
#[derive(Clone)]
pub struct EvalContext {
    in_group: Option<InGroupFn>,
    now: chrono::DateTime<Utc>,
}

impl EvalContext {
    /// Create a new evaluation context with the current time
    pub fn new() -> Self {
        Self {
            in_group: None,
            now: Utc::now(),
        }
    }

    /// Supply a category-hierarchy resolver for the `inGroup` operator
    pub fn with_in_group(mut self, resolver: InGroupFn) -> Self {
        self.in_group = Some(resolver);
        self
    }

    /// Pin the evaluation clock, used by the `within` operator
    pub fn with_now(mut self, now: chrono::DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// The evaluation clock
    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.now
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("in_group", &self.in_group.is_some())
            .field("now", &self.now)
            .finish()
    }
}

/// Resolve a dot-separated path within an entity record.
///
/// Any missing segment, or a non-object value encountered before the final
/// segment, yields `None`.
pub fn get_field_value<'a>(entity: &'a Entity, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = entity.get(segments.next()?)?;

    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }

    Some(current)
}

/// Recursive condition-tree evaluator
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a single node of a condition tree against an entity
    pub fn evaluate(node: &ConditionNode, entity: &Entity, ctx: &EvalContext) -> bool {
        match node {
            ConditionNode::Condition(condition) => Self::evaluate_condition(condition, entity, ctx),
            ConditionNode::Group(group) => Self::evaluate_group(group, entity, ctx),
        }
    }

    /// Evaluate a condition group against an entity.
    ///
    /// An empty group is vacuously true for both operators.
    pub fn evaluate_group(group: &ConditionGroup, entity: &Entity, ctx: &EvalContext) -> bool {
        if group.conditions.is_empty() {
            return true;
        }

        match group.operator {
            LogicOperator::And => group
                .conditions
                .iter()
                .all(|node| Self::evaluate(node, entity, ctx)),
            LogicOperator::Or => group
                .conditions
                .iter()
                .any(|node| Self::evaluate(node, entity, ctx)),
        }
    }

    /// Evaluate a leaf condition against an entity
    pub fn evaluate_condition(condition: &Condition, entity: &Entity, ctx: &EvalContext) -> bool {
        let field_value = get_field_value(entity, &condition.field);
        let result = Self::apply_operator(condition, field_value, ctx);

        if condition.negate {
            !result
        } else {
            result
        }
    }

    fn apply_operator(
        condition: &Condition,
        field_value: Option<&Value>,
        ctx: &EvalContext,
    ) -> bool {
        let operator = condition.operator;

        // Presence operators have meaning for absent fields
        match operator {
            ConditionOperator::IsNull => {
                return field_value.map_or(true, Value::is_null);
            }
            ConditionOperator::IsEmpty => {
                return Self::is_empty(field_value);
            }
            ConditionOperator::Unknown => {
                warn!(field = %condition.field, "Unknown condition operator; evaluating to false");
                return false;
            }
            _ => {}
        }

        // Everything else fails safely when the field is missing
        let Some(field_value) = field_value else {
            return false;
        };

        match operator {
            ConditionOperator::Equals => Self::loose_eq(field_value, &condition.value),
            ConditionOperator::NotEquals => !Self::loose_eq(field_value, &condition.value),
            ConditionOperator::Contains => {
                Self::str_test(field_value, &condition.value, |a, b| a.contains(b))
            }
            ConditionOperator::StartsWith => {
                Self::str_test(field_value, &condition.value, |a, b| a.starts_with(b))
            }
            ConditionOperator::EndsWith => {
                Self::str_test(field_value, &condition.value, |a, b| a.ends_with(b))
            }
            ConditionOperator::Matches => Self::regex_match(field_value, &condition.value),
            ConditionOperator::GreaterThan => {
                Self::numeric_test(field_value, &condition.value, |a, b| a > b)
            }
            ConditionOperator::LessThan => {
                Self::numeric_test(field_value, &condition.value, |a, b| a < b)
            }
            ConditionOperator::GreaterThanOrEquals => {
                Self::numeric_test(field_value, &condition.value, |a, b| a >= b)
            }
            ConditionOperator::LessThanOrEquals => {
                Self::numeric_test(field_value, &condition.value, |a, b| a <= b)
            }
            ConditionOperator::Between => Self::between(field_value, condition),
            ConditionOperator::In => Self::in_list(field_value, &condition.value),
            ConditionOperator::InGroup => match &ctx.in_group {
                Some(resolver) => resolver(field_value, &condition.value),
                None => {
                    warn!(
                        field = %condition.field,
                        "inGroup condition evaluated without a category hierarchy resolver; returning false"
                    );
                    false
                }
            },
            ConditionOperator::Before => Self::date_test(field_value, &condition.value, |a, b| a < b),
            ConditionOperator::After => Self::date_test(field_value, &condition.value, |a, b| a > b),
            ConditionOperator::Within => Self::within(field_value, &condition.value, ctx),
            ConditionOperator::DayOfWeek => Self::day_of_week(field_value, &condition.value),
            ConditionOperator::DayOfMonth => Self::day_of_month(field_value, &condition.value),
            // Presence operators and Unknown were handled above
            ConditionOperator::IsNull | ConditionOperator::IsEmpty | ConditionOperator::Unknown => {
                unreachable!()
            }
        }
    }

    /// Loose equality: case-insensitive for string pairs, coercing when
    /// either side is a number, identity otherwise
    fn loose_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
            _ if a.is_numeric() || b.is_numeric() => match (a.coerce_f64(), b.coerce_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            _ => a == b,
        }
    }

    /// Case-insensitive string test; both operands must be strings
    fn str_test<F>(a: &Value, b: &Value, test: F) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        match (a, b) {
            (Value::String(x), Value::String(y)) => test(&x.to_lowercase(), &y.to_lowercase()),
            _ => false,
        }
    }

    fn regex_match(field: &Value, pattern: &Value) -> bool {
        let (Value::String(s), Value::String(pattern)) = (field, pattern) else {
            return false;
        };

        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(s),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid regex in condition; evaluating to false");
                false
            }
        }
    }

    /// Numeric comparison with coercion of both sides; non-numeric fails
    fn numeric_test<F>(a: &Value, b: &Value, test: F) -> bool
    where
        F: Fn(f64, f64) -> bool,
    {
        match (a.coerce_f64(), b.coerce_f64()) {
            (Some(x), Some(y)) => test(x, y),
            _ => false,
        }
    }

    fn between(field: &Value, condition: &Condition) -> bool {
        let bounds = (
            field.coerce_f64(),
            condition.value.coerce_f64(),
            condition.value2.as_ref().and_then(Value::coerce_f64),
        );
        match bounds {
            (Some(v), Some(min), Some(max)) => v >= min && v <= max,
            _ => false,
        }
    }

    fn in_list(field: &Value, list: &Value) -> bool {
        match list {
            Value::Array(items) => items.iter().any(|item| Self::loose_eq(field, item)),
            _ => false,
        }
    }

    fn is_empty(value: Option<&Value>) -> bool {
        match value {
            None => true,
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        }
    }

    fn date_test<F>(a: &Value, b: &Value, test: F) -> bool
    where
        F: Fn(chrono::DateTime<Utc>, chrono::DateTime<Utc>) -> bool,
    {
        match (a.coerce_datetime(), b.coerce_datetime()) {
            (Some(x), Some(y)) => test(x, y),
            _ => false,
        }
    }

    /// Field date within `[now, now + N days]` inclusive; past dates fail
    fn within(field: &Value, days: &Value, ctx: &EvalContext) -> bool {
        let (Some(date), Some(days)) = (field.coerce_datetime(), days.coerce_f64()) else {
            return false;
        };

        let now = ctx.now();
        date >= now && date <= now + Duration::days(days as i64)
    }

    /// UTC day-of-week (Sunday = 0) membership in a list of names or numbers
    fn day_of_week(field: &Value, expected: &Value) -> bool {
        let Some(date) = field.coerce_datetime() else {
            return false;
        };
        let dow = date.weekday().num_days_from_sunday();
        Self::weekday_matches(dow, expected)
    }

    fn weekday_matches(dow: u32, expected: &Value) -> bool {
        match expected {
            Value::Array(items) => items.iter().any(|item| Self::weekday_matches(dow, item)),
            Value::Integer(i) => *i == dow as i64,
            Value::Float(f) => *f == dow as f64,
            Value::String(s) => match Self::parse_day_name(s) {
                Some(named) => named == dow,
                None => s.trim().parse::<u32>().map_or(false, |n| n == dow),
            },
            _ => false,
        }
    }

    fn parse_day_name(name: &str) -> Option<u32> {
        match name.trim().to_lowercase().as_str() {
            "sunday" | "sun" => Some(0),
            "monday" | "mon" => Some(1),
            "tuesday" | "tue" => Some(2),
            "wednesday" | "wed" => Some(3),
            "thursday" | "thu" => Some(4),
            "friday" | "fri" => Some(5),
            "saturday" | "sat" => Some(6),
            _ => None,
        }
    }

    /// UTC day-of-month equality
    fn day_of_month(field: &Value, expected: &Value) -> bool {
        let Some(date) = field.coerce_datetime() else {
            return false;
        };
        let Some(day) = expected.coerce_f64() else {
            debug!("dayOfMonth condition with non-numeric operand; evaluating to false");
            return false;
        };
        date.day() as f64 == day
    }
}
