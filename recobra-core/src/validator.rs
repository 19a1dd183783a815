//! Enumerated-field validation and repair
//!
//! Classification and summarization output can come from a semi-trusted
//! generator (typically an LLM) that occasionally wraps values in literal
//! quotes or invents codes outside the schema. `normalize` coerces any such
//! value into the configured enumeration deterministically:
//!
//! 1. If the value is bounded by a matching pair of quote characters, strip
//!    exactly one layer and accept the stripped value if it is allowed.
//! 2. Otherwise accept the value if it is allowed.
//! 3. Otherwise fall back to the constraint's default.
//!
//! Exactly one repair attempt, no fuzzy matching, no case folding: repair
//! behavior must stay predictable and auditable. The result always reports
//! whether a repair occurred.

use serde::{Deserialize, Serialize};

/// Per-field configuration: the allowed value set and the escape value used
/// when repair fails. The default need not be a member of `allowed_values`;
/// conventionally it is "N/A".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumConstraint {
    /// Output field this constraint applies to
    pub field_name: String,
    /// Allowed values, in configuration order
    pub allowed_values: Vec<String>,
    /// Explicit escape value for unrepairable input
    pub default_value: String,
}

impl EnumConstraint {
    pub fn new(
        field_name: impl Into<String>,
        allowed_values: Vec<String>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            allowed_values,
            default_value: default_value.into(),
        }
    }

    fn allows(&self, value: &str) -> bool {
        self.allowed_values.iter().any(|v| v == value)
    }
}

/// What `normalize` did to produce its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Value was already a member of the allowed set
    PassedThrough,
    /// One layer of quoting was stripped to recover an allowed value
    QuoteStripped,
    /// Value could not be recovered; the constraint default was substituted
    Defaulted,
}

impl RepairAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairAction::PassedThrough => "passed_through",
            RepairAction::QuoteStripped => "quote_stripped",
            RepairAction::Defaulted => "defaulted",
        }
    }
}

/// The accepted value plus the audit trail of how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedValue {
    pub value: String,
    pub action: RepairAction,
}

impl NormalizedValue {
    /// Whether the output differs from straight pass-through
    pub fn was_repaired(&self) -> bool {
        self.action != RepairAction::PassedThrough
    }
}

/// Strip exactly one layer of matching quotes, if present.
fn strip_one_quote_layer(value: &str) -> Option<&str> {
    let mut chars = value.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if first == last && matches!(first, '"' | '\'' | '`') {
        Some(&value[first.len_utf8()..value.len() - last.len_utf8()])
    } else {
        None
    }
}

/// Coerce `raw_value` into `allowed_values ∪ {default_value}`.
///
/// Total: never fails, for every input including `None`, empty strings, and
/// arbitrarily-quoted garbage.
pub fn normalize(raw_value: Option<&str>, constraint: &EnumConstraint) -> NormalizedValue {
    let Some(raw) = raw_value else {
        return NormalizedValue {
            value: constraint.default_value.clone(),
            action: RepairAction::Defaulted,
        };
    };

    if let Some(stripped) = strip_one_quote_layer(raw) {
        if constraint.allows(stripped) {
            return NormalizedValue {
                value: stripped.to_string(),
                action: RepairAction::QuoteStripped,
            };
        }
    }

    if constraint.allows(raw) {
        return NormalizedValue {
            value: raw.to_string(),
            action: RepairAction::PassedThrough,
        };
    }

    NormalizedValue {
        value: constraint.default_value.clone(),
        action: RepairAction::Defaulted,
    }
}

/// Record of a repair applied to a payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRepair {
    pub field_name: String,
    pub action: RepairAction,
}

/// Apply a constraint set to a JSON payload in place.
///
/// Only fields present in the payload are touched; a constraint for an absent
/// field is skipped (the field may have been evicted from a cached payload).
/// Non-string values are treated like missing strings and resolved to the
/// constraint default. Returns the repairs that occurred, for auditing.
pub fn normalize_fields(
    payload: &mut serde_json::Map<String, serde_json::Value>,
    constraints: &[EnumConstraint],
) -> Vec<FieldRepair> {
    let mut repairs = Vec::new();
    for constraint in constraints {
        let Some(value) = payload.get(&constraint.field_name) else {
            continue;
        };
        let normalized = normalize(value.as_str(), constraint);
        if normalized.was_repaired() {
            tracing::warn!(
                field = %constraint.field_name,
                action = normalized.action.as_str(),
                "repaired enumerated field"
            );
            repairs.push(FieldRepair {
                field_name: constraint.field_name.clone(),
                action: normalized.action,
            });
        }
        payload.insert(
            constraint.field_name.clone(),
            serde_json::Value::String(normalized.value),
        );
    }
    repairs
}
