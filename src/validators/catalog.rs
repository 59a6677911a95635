//! Rule document loading.
//!
//! The rule document is a JSON file edited outside the service:
//!
//! ```json
//! {
//!   "validations": [
//!     {
//!       "type": "Smartwatch",
//!       "preRequestName": "isEnabled",
//!       "preRequestValue": "true",
//!       "rules": [
//!         { "paramName": "batteryLevel", "regex": "^[0-9]{1,3}$" },
//!         { "paramName": "band", "regex": ["Sport", "Leather"] },
//!         { "paramName": "serial" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Loading is all-or-nothing: a document with a single bad group or an
//! uncompilable pattern yields an error and no catalog.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Rule group as written in the document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleGroupDoc {
    #[serde(rename = "type")]
    subtype: String,
    pre_request_name: String,
    pre_request_value: String,
    rules: Vec<FieldRuleDoc>,
}

/// Field rule as written in the document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRuleDoc {
    param_name: String,
    #[serde(default)]
    regex: Option<ConstraintDoc>,
}

/// The `regex` node is either a pattern or a list of allowed literals
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConstraintDoc {
    Pattern(String),
    Allowed(Vec<String>),
}

/// Constraint applied to a single attribute, decided once at load time
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Value must equal one of these literals (case-sensitive)
    Enumeration(Vec<String>),
    /// Value must match this expression (unanchored unless the pattern anchors itself)
    Pattern(Regex),
    /// Attribute only has to be present
    PresenceOnly,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub param_name: String,
    pub constraint: Constraint,
}

/// Field rules scoped to one subtype and one trigger value
#[derive(Debug, Clone)]
pub struct RuleGroup {
    pub subtype_name: String,
    pub trigger_field_name: String,
    /// Stored lower-cased
    pub trigger_field_value: String,
    pub field_rules: Vec<FieldRule>,
}

/// Ordered, immutable set of rule groups
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    groups: Vec<RuleGroup>,
}

#[derive(Debug, Error)]
pub enum RuleDocumentError {
    #[error("failed to read rule document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("rule document has no top-level \"validations\" array")]
    MissingValidations,

    #[error("rule group #{index} is malformed: {reason}")]
    InvalidGroup { index: usize, reason: String },

    #[error("rule group #{index}: pattern for {param} does not compile: {source}")]
    InvalidPattern {
        index: usize,
        param: String,
        #[source]
        source: regex::Error,
    },
}

impl RuleCatalog {
    /// Load a catalog from a rule document on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuleDocumentError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading rule document");
        let contents = fs::read_to_string(path).map_err(|source| RuleDocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&contents)?;
        info!(
            "📜 Loaded {} rule group(s) from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse and compile a rule document
    pub fn from_json_str(contents: &str) -> Result<Self, RuleDocumentError> {
        let root: Value = serde_json::from_str(contents)?;
        let entries = root
            .get("validations")
            .and_then(Value::as_array)
            .ok_or(RuleDocumentError::MissingValidations)?;

        let groups = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| compile_group(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { groups })
    }

    /// Groups in document order
    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Indices of groups that can never be selected.
    ///
    /// Matching is first-in-document-wins, so a group repeating an earlier
    /// group's (subtype, trigger field, trigger value) triple is dead
    /// configuration.
    pub fn shadowed_groups(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| {
                !seen.insert((
                    g.subtype_name.as_str(),
                    g.trigger_field_name.as_str(),
                    g.trigger_field_value.as_str(),
                ))
            })
            .map(|(index, _)| index)
            .collect()
    }
}

fn compile_group(index: usize, entry: &Value) -> Result<RuleGroup, RuleDocumentError> {
    let doc: RuleGroupDoc = serde_json::from_value(entry.clone()).map_err(|e| {
        RuleDocumentError::InvalidGroup {
            index,
            reason: e.to_string(),
        }
    })?;

    let mut field_rules = Vec::with_capacity(doc.rules.len());
    for rule in doc.rules {
        let constraint = match rule.regex {
            None => Constraint::PresenceOnly,
            Some(ConstraintDoc::Allowed(values)) => Constraint::Enumeration(values),
            Some(ConstraintDoc::Pattern(pattern)) => {
                let regex = Regex::new(&pattern).map_err(|source| {
                    RuleDocumentError::InvalidPattern {
                        index,
                        param: rule.param_name.clone(),
                        source,
                    }
                })?;
                Constraint::Pattern(regex)
            }
        };
        field_rules.push(FieldRule {
            param_name: rule.param_name,
            constraint,
        });
    }

    Ok(RuleGroup {
        subtype_name: doc.subtype,
        trigger_field_name: doc.pre_request_name,
        trigger_field_value: doc.pre_request_value.to_lowercase(),
        field_rules,
    })
}
