//! Hook-name to trigger translation.
//!
//! Hook invocations arrive as a kebab-case name plus an optional JSON
//! payload, either on the command line or as a spool file dropped by the
//! host-management layer. Both forms share the trigger's own serialized
//! representation, so parsing is one envelope deserialization.

use miette::{IntoDiagnostic, Result, miette};
use serde_json::{Map, Value};

use warden_engine::Trigger;

/// Build a trigger from a hook name and optional JSON payload.
pub fn parse(hook: &str, payload: Option<Value>) -> Result<Trigger> {
    let mut envelope = Map::new();
    envelope.insert("hook".to_string(), Value::String(hook.to_string()));
    if let Some(data) = payload {
        envelope.insert("data".to_string(), data);
    }
    serde_json::from_value(Value::Object(envelope))
        .map_err(|e| miette!("unrecognized hook {:?}: {}", hook, e))
}

/// Parse a spool file's contents as a serialized trigger.
pub fn parse_spool(contents: &str) -> Result<Trigger> {
    serde_json::from_str(contents).into_diagnostic()
}
