//! Attribute bag validation against a selected rule group.

use super::catalog::{Constraint, RuleGroup};
use super::result::ValidationFailure;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::warn;

/// Check every field rule of `group` in order, stopping at the first failure.
pub fn validate_fields(
    group: &RuleGroup,
    attributes: &Map<String, Value>,
) -> Result<(), ValidationFailure> {
    for rule in &group.field_rules {
        let param = rule.param_name.as_str();

        let Some(value) = attributes.get(param) else {
            warn!("🚫 Missing property: {}", param);
            return Err(ValidationFailure::MissingField {
                param: param.to_string(),
            });
        };

        match &rule.constraint {
            Constraint::PresenceOnly => {}
            Constraint::Enumeration(allowed) => {
                let text = canonical_string(value);
                if !allowed.iter().any(|candidate| candidate.as_str() == text) {
                    warn!("🚫 Invalid value for {}: {}", param, value);
                    return Err(ValidationFailure::DisallowedValue {
                        param: param.to_string(),
                        allowed: allowed.clone(),
                    });
                }
            }
            Constraint::Pattern(regex) => {
                if !regex.is_match(&canonical_string(value)) {
                    warn!("🚫 Regex failed for {}: {}", param, regex.as_str());
                    return Err(ValidationFailure::PatternMismatch {
                        param: param.to_string(),
                        pattern: regex.as_str().to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

/// String form used for constraint checks.
///
/// Strings compare by content, `null` as the empty string, anything else by
/// its compact JSON text (`42`, `true`, `{"a":1}`).
pub fn canonical_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}
