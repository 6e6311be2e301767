//! Admin-configured notification rules and their condition evaluation.
//!
//! Rules are persisted as one JSON array in the generic `system_config`
//! table, so their wire shape is the camelCase JSON the admin screens write:
//!
//! ```json
//! {
//!   "id": "case-closed",
//!   "name": "Case closed",
//!   "enabled": true,
//!   "trigger": {
//!     "event": "case_updated",
//!     "field": "status",
//!     "conditions": [{ "field": "status", "operator": "changed_to", "toValue": ["closed"] }]
//!   },
//!   "targets": { "notifyCreator": true, "notifySpecificRoles": ["admin"] },
//!   "notification": { "type": "case_update", "title": "Case closed", "message": "{case_title} is now {to}" }
//! }
//! ```
//!
//! Conditions are AND-combined. Unknown operators evaluate to `false`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::ids::{CaseId, UserId};
use super::notification::NotificationKind;

/// Event name dispatched when a case field changes.
pub const CASE_UPDATED_EVENT: &str = "case_updated";

/// A single admin-configured rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRule {
    /// Rule identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled rules are never evaluated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When the rule fires.
    pub trigger: RuleTrigger,
    /// Who receives the notification.
    #[serde(default)]
    pub targets: RuleTargets,
    /// What the notification says.
    pub notification: NotificationTemplate,
}

fn default_enabled() -> bool {
    true
}

/// Event and conditions that make a rule fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleTrigger {
    /// Event name, e.g. `"case_updated"`.
    pub event: String,
    /// For field-change events, the field the rule watches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// AND-combined conditions.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

/// One condition of a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// Field the condition applies to; must equal the changed field when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Operator name, kept verbatim so unknown operators survive a round trip.
    pub operator: String,
    /// Comparison value for `equals`, `in`, and friends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
    /// Expected previous value(s) for `changed_from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_value: Option<ConditionValue>,
    /// Expected new value(s) for `changed_to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<ConditionValue>,
}

/// A single string or a list of strings.
///
/// Numbers and booleans are accepted on input and kept in their JSON text
/// form, so `1000` compares equal to `"1000"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ConditionValue {
    /// One value.
    One(String),
    /// Several values.
    Many(Vec<String>),
}

fn scalar_text(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a string, number or boolean, got {other}")),
    }
}

impl TryFrom<Value> for ConditionValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(scalar_text)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many),
            other => scalar_text(other).map(Self::One),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::try_from(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

impl ConditionValue {
    /// Returns `true` if `candidate` equals the value or is in the list.
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            Self::One(v) => v == candidate,
            Self::Many(vs) => vs.iter().any(|v| v == candidate),
        }
    }
}

/// Recognized condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    /// New value equals the expected value.
    Equals,
    /// New value differs from the expected value.
    NotEquals,
    /// New value is in the list.
    In,
    /// New value is not in the list.
    NotIn,
    /// Value changed.
    Changed,
    /// Value changed away from one of the listed values.
    ChangedFrom,
    /// Value changed into one of the listed values.
    ChangedTo,
}

impl ConditionOperator {
    /// Parses an operator name; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            "changed" => Some(Self::Changed),
            "changed_from" => Some(Self::ChangedFrom),
            "changed_to" => Some(Self::ChangedTo),
            _ => None,
        }
    }
}

/// Recipients of a fired rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleTargets {
    /// Every registered user.
    pub notify_all_users: bool,
    /// The creator of the affected case.
    pub notify_creator: bool,
    /// Users holding any of these roles.
    pub notify_specific_roles: Vec<String>,
    /// These users.
    pub notify_specific_users: Vec<UserId>,
}

impl RuleTargets {
    /// Returns `true` if the targets select nobody.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.notify_all_users
            && !self.notify_creator
            && self.notify_specific_roles.is_empty()
            && self.notify_specific_users.is_empty()
    }
}

/// Notification text produced by a fired rule.
///
/// `title` and `message` may contain the placeholders `{case_title}`,
/// `{field}`, `{from}`, and `{to}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTemplate {
    /// Notification type of the emitted rows.
    #[serde(rename = "type", default = "default_template_kind")]
    pub kind: NotificationKind,
    /// Title template.
    pub title: String,
    /// Message template.
    pub message: String,
}

fn default_template_kind() -> NotificationKind {
    NotificationKind::CaseUpdate
}

impl NotificationTemplate {
    /// Renders the title and message against the change context.
    #[must_use]
    pub fn render(&self, ctx: &RuleContext) -> (String, String) {
        (render(&self.title, ctx), render(&self.message, ctx))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(template: &str, ctx: &RuleContext) -> String {
    template
        .replace("{case_title}", ctx.case_title.as_deref().unwrap_or_default())
        .replace("{field}", ctx.field.as_deref().unwrap_or_default())
        .replace("{from}", ctx.from_value.as_deref().unwrap_or_default())
        .replace("{to}", ctx.to_value.as_deref().unwrap_or_default())
}

/// Description of the change a rule is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleContext {
    /// Changed field, for field-change events.
    pub field: Option<String>,
    /// Value before the change.
    pub from_value: Option<String>,
    /// Value after the change.
    pub to_value: Option<String>,
    /// Affected case.
    pub case_id: Option<CaseId>,
    /// Affected case's title, for templates.
    pub case_title: Option<String>,
    /// Affected case's creator, for `notifyCreator`.
    pub creator_id: Option<UserId>,
    /// User who caused the change.
    pub actor_id: Option<UserId>,
}

impl RuleCondition {
    /// Evaluates the condition; unknown operators and missing values are
    /// `false`.
    #[must_use]
    pub fn evaluate(&self, ctx: &RuleContext) -> bool {
        if let Some(field) = &self.field
            && ctx.field.as_deref() != Some(field.as_str())
        {
            return false;
        }
        let Some(op) = ConditionOperator::parse(&self.operator) else {
            return false;
        };
        let from = ctx.from_value.as_deref();
        let to = ctx.to_value.as_deref();
        let changed = from != to;

        match op {
            ConditionOperator::Changed => changed,
            ConditionOperator::Equals | ConditionOperator::In => {
                match (to, self.value.as_ref().or(self.to_value.as_ref())) {
                    (Some(to), Some(expected)) => expected.contains(to),
                    _ => false,
                }
            }
            ConditionOperator::NotEquals | ConditionOperator::NotIn => {
                match (to, self.value.as_ref().or(self.to_value.as_ref())) {
                    (Some(to), Some(expected)) => !expected.contains(to),
                    _ => false,
                }
            }
            ConditionOperator::ChangedFrom => {
                match (from, self.from_value.as_ref().or(self.value.as_ref())) {
                    (Some(from), Some(expected)) => changed && expected.contains(from),
                    _ => false,
                }
            }
            ConditionOperator::ChangedTo => {
                match (to, self.to_value.as_ref().or(self.value.as_ref())) {
                    (Some(to), Some(expected)) => changed && expected.contains(to),
                    _ => false,
                }
            }
        }
    }
}

impl NotificationRule {
    /// Parses a stored rule set one entry at a time.
    ///
    /// An entry that does not deserialize is skipped with a warning; the
    /// remaining rules stay active. Anything other than an array (or null)
    /// yields no rules.
    #[must_use]
    pub fn parse_set(value: Value) -> Vec<Self> {
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Null => return Vec::new(),
            other => {
                tracing::warn!(kind = json_kind(&other), "notification rules config is not an array");
                return Vec::new();
            }
        };
        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let id = entry
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{index}"));
                match serde_json::from_value::<Self>(entry) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::warn!(rule_id = %id, error = %e, "skipping malformed notification rule");
                        None
                    }
                }
            })
            .collect()
    }

    /// Returns `true` if the rule is enabled, listens to `event` (and the
    /// changed field, when it names one), and every condition passes.
    #[must_use]
    pub fn matches(&self, event: &str, ctx: &RuleContext) -> bool {
        if !self.enabled || self.trigger.event != event {
            return false;
        }
        if let Some(field) = &self.trigger.field
            && ctx.field.as_deref() != Some(field.as_str())
        {
            return false;
        }
        self.trigger.conditions.iter().all(|c| c.evaluate(ctx))
    }
}
