//! Declared-license extraction from ClearlyDefined definition payloads.
//!
//! The engine reads a single path out of the JSON body and ignores the
//! rest. A payload that cannot be parsed, or whose declared license is
//! not a string, is logged and leaves the component untouched; the fetch
//! itself still counts as a success and the body is still cached.

use crate::component::Component;
use serde_json::Value;
use tracing::{error, warn};

/// Property name under which the declared license is attached.
pub const DECLARED_LICENSE_PROPERTY: &str = "clearly-defined";

/// Extract `licensed.declared` from a definition payload.
pub fn declared_license(payload: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "failed to parse definition payload");
            return None;
        }
    };
    match value.pointer("/licensed/declared") {
        Some(Value::String(license)) => Some(license.clone()),
        Some(other) => {
            warn!(declared = %other, "declared license is not a string");
            None
        }
        None => None,
    }
}

/// Annotate `component` with the declared license, when one is present.
pub fn annotate(component: &dyn Component, payload: &str) {
    if let Some(license) = declared_license(payload) {
        component.add_property(DECLARED_LICENSE_PROPERTY, &license);
    }
}
