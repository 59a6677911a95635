//! Rule engine for device attribute validation
//!
//! A device's `additionalProperties` bag has no fixed schema; which fields it
//! must carry depends on the device type and on whether the device is enabled.
//! Those requirements live in an external rule document.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Rule Catalog (catalog.rs)         │
//! │  • Parsed once, immutable, shared       │
//! └────────┬────────────────────────────────┘
//!          │
//!          ├──> Subtype Resolver (id → type name)
//!          ├──> Matcher (type name + trigger value → rule group)
//!          └──> Field Validator (rule group + attribute bag → first violation)
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use device_gate::validators::*;
//! use serde_json::json;
//!
//! let catalog = RuleCatalog::from_json_str(r#"{ "validations": [
//!     { "type": "Smartwatch", "preRequestName": "isEnabled", "preRequestValue": "true",
//!       "rules": [ { "paramName": "batteryLevel", "regex": "^[0-9]{1,3}$" } ] }
//! ] }"#).unwrap();
//!
//! let group = select_group(&catalog, "Smartwatch", "isEnabled", &json!(true)).unwrap();
//! let bag = json!({ "batteryLevel": "abc" });
//! let failure = validate_fields(group, bag.as_object().unwrap()).unwrap_err();
//! assert_eq!(failure.to_string(), "Invalid value for batteryLevel (regex: ^[0-9]{1,3}$)");
//! ```

pub mod catalog;
pub mod context;
pub mod field;
pub mod matcher;
pub mod resolver;
pub mod result;

// Re-export commonly used types
pub use catalog::{Constraint, FieldRule, RuleCatalog, RuleDocumentError, RuleGroup};
pub use context::{RequestFields, RequestSnapshot, SnapshotError};
pub use field::{canonical_string, validate_fields};
pub use matcher::{select_group, stringify_trigger};
pub use resolver::{ResolveError, StaticSubtypeResolver, SubtypeKey, SubtypeResolver};
pub use result::{GateDecision, PassReason, ValidationFailure};
