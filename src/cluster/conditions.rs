use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

/// Condition type reporting whether the connection's informers are synced
pub const INFORMERS_SYNCED: &str = "InformersSynced";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// How bad a `False` condition is. Always `None` for other statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    None,
    Error,
    Warning,
    Info,
}

/// Observed state of one aspect of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// Last time `status` changed
    pub last_transition_time: SystemTime,
}

/// A record carrying a list of conditions in its status
pub trait Conditioned {
    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

pub fn get<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// Inserts or replaces the condition of the same type. The transition time
/// is carried over when the status does not change.
pub fn set(
    conditions: &mut Vec<Condition>,
    mut condition: Condition,
) {
    match conditions.iter_mut().find(|c| c.condition_type == condition.condition_type) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => {
            conditions.push(condition);
            conditions.sort_by(|a, b| a.condition_type.cmp(&b.condition_type));
        }
    }
}

pub fn mark_true(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
) {
    set(
        conditions,
        Condition {
            condition_type: condition_type.to_string(),
            status: ConditionStatus::True,
            severity: Severity::None,
            reason: String::new(),
            message: String::new(),
            last_transition_time: SystemTime::now(),
        },
    );
}

pub fn mark_false(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    reason: &str,
    severity: Severity,
    message: impl Into<String>,
) {
    set(
        conditions,
        Condition {
            condition_type: condition_type.to_string(),
            status: ConditionStatus::False,
            severity,
            reason: reason.to_string(),
            message: message.into(),
            last_transition_time: SystemTime::now(),
        },
    );
}

pub fn is_true(
    conditions: &[Condition],
    condition_type: &str,
) -> bool {
    get(conditions, condition_type).is_some_and(|c| c.status == ConditionStatus::True)
}
