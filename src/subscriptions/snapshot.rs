//! Snapshot text and push frames.

use super::types::SubscriptionId;
use crate::error::Result;
use crate::patch::Patch;
use regex::Regex;
use std::sync::OnceLock;

fn quoted_key() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([{,])"([A-Za-z_$][\w$]*)":"#).expect("key pattern is valid")
    })
}

/// Compact JSON with object keys unquoted: `{"id":"p1"}` becomes `{id:"p1"}`.
///
/// Readers need a JSON-superset parser. Only keys right after `{` or `,`
/// are touched; inside compact JSON strings a quote is always escaped, so
/// string contents never match.
pub fn relax_json(value: &serde_json::Value) -> Result<String> {
    let text = serde_json::to_string(value)?;
    Ok(quoted_key().replace_all(&text, "${1}${2}:").into_owned())
}

/// `[id, ...ops]`.
pub fn push_frame(id: &SubscriptionId, patch: &Patch) -> Result<String> {
    let mut frame = vec![serde_json::Value::String(id.0.clone())];
    frame.extend(patch.to_wire());
    Ok(serde_json::to_string(&frame)?)
}
