//! Rule group selection.
//!
//! Selection is a linear scan in document order and the first satisfying
//! group wins. A later group with the same subtype and trigger value can
//! never be reached; `RuleCatalog::shadowed_groups` reports those.

use super::catalog::{RuleCatalog, RuleGroup};
use serde_json::Value;
use tracing::debug;

/// Pick the rule group for a resolved subtype and the observed trigger value.
///
/// The trigger comparison is textual: the observed value is stringified and
/// lower-cased, then compared with the group's (already lower-cased) value.
/// `true`, `"true"` and `"TRUE"` therefore all select a `"true"` group.
pub fn select_group<'a>(
    catalog: &'a RuleCatalog,
    subtype_name: &str,
    trigger_field_name: &str,
    observed: &Value,
) -> Option<&'a RuleGroup> {
    let observed = stringify_trigger(observed).to_lowercase();
    debug!(
        subtype = subtype_name,
        trigger = trigger_field_name,
        value = %observed,
        groups = catalog.len(),
        "Selecting rule group"
    );

    catalog.groups().iter().find(|group| {
        group.subtype_name == subtype_name
            && group.trigger_field_name == trigger_field_name
            && group.trigger_field_value == observed
    })
}

/// Textual form of a trigger value
pub fn stringify_trigger(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
