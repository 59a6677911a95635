//! # device-gate - A Validating Gateway for Device Writes
//!
//! device-gate is an HTTP/1.1 reverse proxy that sits in front of a device
//! management API and validates create/update requests before they reach it.
//!
//! A device carries a free-form `additionalProperties` bag whose required
//! contents depend on the device type and on whether the device is enabled.
//! Those requirements live in an external JSON rule document; the gate loads
//! it, picks the rule group matching the request, and rejects the request with
//! a 400 naming the first offending property. Requests that pass (or that no
//! rule group covers) are forwarded with their body byte-for-byte intact.
//!
//! ## Features
//! - Rule groups keyed by device type and trigger value, first match wins
//! - Presence, pattern and allowed-value constraints, fail-fast
//! - Pluggable device type lookup ([`validators::SubtypeResolver`])
//! - TOML-based configuration

pub mod config;
pub mod interceptor;
pub mod parsers;
pub mod proxy;
pub mod routing;
pub mod validators;

pub use config::Config;
pub use interceptor::Interceptor;
pub use validators::{GateDecision, PassReason, RuleCatalog};
