//! Request interception for guarded device endpoints
//!
//! Each guarded request walks the same path:
//!
//! ```text
//! Received → BufferedBody → Parsed → SubtypeResolved → RuleSelected
//!          → Validated | Skipped → Forwarded | Rejected
//! ```
//!
//! The body is only ever read through a [`RewindGuard`], so whichever way the
//! request leaves the pipeline its body is back at its starting position for
//! the backend.

mod body;

pub use body::RewindGuard;

use crate::config::ValidationSettings;
use crate::routing::ProtectedRoute;
use crate::validators::{
    select_group, validate_fields, GateDecision, PassReason, RequestFields, RequestSnapshot,
    RuleCatalog, RuleDocumentError, SnapshotError, SubtypeResolver,
};
use serde_json::Value;
use std::io::{Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const INVALID_PAYLOAD: &str = "Invalid device data.";
pub const RULES_UNAVAILABLE: &str = "Validation rules unavailable.";
pub const LOOKUP_FAILED: &str = "Device type lookup failed.";

/// Where the interceptor gets its rule catalog from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Loaded once and shared read-only by every request
    Shared(Arc<RuleCatalog>),
    /// Re-read from disk for every guarded request
    PerRequest(PathBuf),
}

impl CatalogSource {
    pub fn current(&self) -> Result<Arc<RuleCatalog>, RuleDocumentError> {
        match self {
            CatalogSource::Shared(catalog) => Ok(Arc::clone(catalog)),
            CatalogSource::PerRequest(path) => RuleCatalog::from_file(path).map(Arc::new),
        }
    }
}

/// Validation gate in front of the device create/update endpoints
pub struct Interceptor {
    route: ProtectedRoute,
    fields: RequestFields,
    catalog: CatalogSource,
    resolver: Arc<dyn SubtypeResolver>,
}

impl Interceptor {
    pub fn new(
        route: ProtectedRoute,
        fields: RequestFields,
        catalog: CatalogSource,
        resolver: Arc<dyn SubtypeResolver>,
    ) -> Self {
        Self {
            route,
            fields,
            catalog,
            resolver,
        }
    }

    /// Build from the `[validation]` config section.
    ///
    /// `catalog` is the start-up load of `settings.rules_file`. With
    /// `reload_per_request` it only proves the document is valid at start-up;
    /// requests read their own copy.
    pub fn from_settings(
        settings: &ValidationSettings,
        catalog: RuleCatalog,
        resolver: Arc<dyn SubtypeResolver>,
    ) -> Self {
        let source = if settings.reload_per_request {
            CatalogSource::PerRequest(settings.rules_file.clone())
        } else {
            CatalogSource::Shared(Arc::new(catalog))
        };

        Self::new(
            ProtectedRoute::from_settings(settings),
            RequestFields::from_settings(settings),
            source,
            resolver,
        )
    }

    pub fn route(&self) -> &ProtectedRoute {
        &self.route
    }

    /// Whether a request goes through validation at all
    pub fn applies_to(&self, method: &str, path: &str) -> bool {
        self.route.matches(method, path)
    }

    /// Decide whether a request may proceed.
    ///
    /// Unguarded requests are forwarded without touching `body`. For guarded
    /// ones the body is read and then restored to its original position
    /// before this returns, whatever the outcome.
    pub fn intercept<B: Read + Seek>(&self, method: &str, path: &str, body: &mut B) -> GateDecision {
        if !self.applies_to(method, path) {
            return GateDecision::Forward(PassReason::Unprotected);
        }
        self.inspect(body)
    }

    /// Run the validation pipeline on a guarded request body
    pub fn inspect<B: Read + Seek>(&self, body: &mut B) -> GateDecision {
        let mut guard = match RewindGuard::acquire(body) {
            Ok(guard) => guard,
            Err(e) => {
                error!(error = %e, "Cannot buffer request body");
                return GateDecision::reject(400, INVALID_PAYLOAD);
            }
        };
        debug!(origin = guard.origin(), "Body buffered");

        let document: Value = match serde_json::from_reader(&mut guard) {
            Ok(document) => document,
            Err(e) => {
                warn!("⚠️  Error parsing device JSON: {}", e);
                return GateDecision::reject(400, INVALID_PAYLOAD);
            }
        };
        drop(guard);
        debug!("Body parsed");

        let snapshot = match RequestSnapshot::extract(&document, &self.fields) {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::MissingRequired) => {
                return GateDecision::reject(400, self.fields.missing_message());
            }
            Err(SnapshotError::Malformed) => {
                warn!("⚠️  Device payload has unexpected field types");
                return GateDecision::reject(400, INVALID_PAYLOAD);
            }
        };

        let subtype_name = match self.resolver.resolve_name(&snapshot.subtype) {
            Ok(Some(name)) => name,
            Ok(None) => {
                warn!("⚠️  Device type not found: {}", snapshot.subtype);
                return GateDecision::Forward(PassReason::UnknownSubtype);
            }
            Err(e) => {
                error!("❌ Device type lookup for {} failed: {}", snapshot.subtype, e);
                return GateDecision::reject(502, LOOKUP_FAILED);
            }
        };
        debug!(subtype = %subtype_name, "Subtype resolved");

        let catalog = match self.catalog.current() {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("❌ Failed to load validation rules: {}", e);
                return GateDecision::reject(500, RULES_UNAVAILABLE);
            }
        };

        let Some(group) = select_group(
            &catalog,
            &subtype_name,
            &self.fields.trigger,
            &snapshot.trigger_value,
        ) else {
            debug!(subtype = %subtype_name, "No rule group applies, skipping validation");
            return GateDecision::Forward(PassReason::NoMatchingGroup);
        };
        debug!(
            subtype = %subtype_name,
            rules = group.field_rules.len(),
            "Rule group selected"
        );

        match validate_fields(group, &snapshot.attributes) {
            Ok(()) => {
                debug!(subtype = %subtype_name, "Attribute bag validated");
                GateDecision::Forward(PassReason::Validated)
            }
            Err(failure) => failure.into(),
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("route", &self.route)
            .field("fields", &self.fields)
            .field("catalog", &self.catalog)
            .finish()
    }
}
