//! Routing module for deciding which requests the gate inspects
//!
//! Only create/update calls on the device resource are validated; everything
//! else is proxied untouched.

use crate::config::ValidationSettings;
use tracing::debug;

/// Method + path-prefix filter for the guarded resource
#[derive(Debug, Clone)]
pub struct ProtectedRoute {
    prefix: String,
    methods: Vec<String>,
}

impl ProtectedRoute {
    pub fn new(prefix: impl Into<String>, methods: &[String]) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        Self {
            prefix,
            methods: methods.iter().map(|m| m.to_uppercase()).collect(),
        }
    }

    pub fn from_settings(settings: &ValidationSettings) -> Self {
        Self::new(settings.resource_prefix.clone(), &settings.methods)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Check whether a request must pass validation
    pub fn matches(&self, method: &str, target: &str) -> bool {
        let method_upper = method.to_uppercase();
        if !self.methods.iter().any(|m| *m == method_upper) {
            return false;
        }

        let path = strip_query(target);
        let matched = starts_with_segments(path, &self.prefix);
        debug!(%method, %path, prefix = %self.prefix, matched, "Evaluated protected route");
        matched
    }
}

/// Drop the query string and fragment from a request target
fn strip_query(target: &str) -> &str {
    let end = target.find(&['?', '#'][..]).unwrap_or(target.len());
    &target[..end]
}

/// Segment-aware, case-insensitive prefix match.
///
/// `/api/devices` matches `/api/devices`, `/api/devices/` and
/// `/api/devices/7`, but not `/api/devicesX`.
fn starts_with_segments(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match (path.get(..prefix.len()), path.get(prefix.len()..)) {
        (Some(head), Some(rest)) => {
            head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('/'))
        }
        _ => false,
    }
}
