//! Patch operations, application and wire encoding.

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One unit of an edit script.
///
/// Offsets count `char`s of the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOp {
    /// Copy `source[start..end]`, or `source[start..]` when `end` is `None`.
    Copy { start: usize, end: Option<usize> },
    /// Insert text verbatim.
    Literal(String),
}

/// An ordered edit script turning one snapshot into another.
///
/// On the wire a patch is a flat JSON array: a copy is one number (open
/// ended) or two numbers (start and end), a literal is a string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patch(pub Vec<PatchOp>);

impl Patch {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// A patch that replaces everything with `text`.
    pub fn literal(text: impl Into<String>) -> Self {
        Self(vec![PatchOp::Literal(text.into())])
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push_copy(&mut self, start: usize, end: Option<usize>) {
        self.0.push(PatchOp::Copy { start, end });
    }

    /// Empty literals carry nothing and are skipped.
    pub(crate) fn push_literal(&mut self, text: &[char]) {
        if !text.is_empty() {
            self.0.push(PatchOp::Literal(text.iter().collect()));
        }
    }

    /// Apply this patch to `source`.
    pub fn apply(&self, source: &str) -> String {
        apply(source, self)
    }

    /// Flatten into wire values, the same shape `Serialize` produces.
    pub fn to_wire(&self) -> Vec<serde_json::Value> {
        let mut values = Vec::with_capacity(self.0.len());
        for op in &self.0 {
            match op {
                PatchOp::Copy { start, end } => {
                    values.push(serde_json::Value::from(*start as u64));
                    if let Some(end) = end {
                        values.push(serde_json::Value::from(*end as u64));
                    }
                }
                PatchOp::Literal(text) => values.push(serde_json::Value::String(text.clone())),
            }
        }
        values
    }
}

/// Rebuild the target text by concatenating copied ranges and literals.
///
/// Only ever apply patches produced by [`diff`](super::diff) against the same
/// source. Out-of-range copies are clamped to the source rather than
/// rejected, so a foreign patch yields garbage but never panics.
pub fn apply(source: &str, patch: &Patch) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());

    for op in &patch.0 {
        match op {
            PatchOp::Copy { start, end } => {
                let end = end.unwrap_or(chars.len()).min(chars.len());
                let start = (*start).min(end);
                out.extend(&chars[start..end]);
            }
            PatchOp::Literal(text) => out.push_str(text),
        }
    }

    out
}

impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = self.to_wire();
        let mut seq = serializer.serialize_seq(Some(wire.len()))?;
        for value in &wire {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireItem {
    Offset(u64),
    Text(String),
}

struct PatchVisitor;

impl<'de> Visitor<'de> for PatchVisitor {
    type Value = Patch;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a flat array of offsets and strings")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Patch, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<WireItem>()? {
            items.push(item);
        }

        let mut patch = Patch::new();
        let mut iter = items.into_iter().peekable();
        while let Some(item) = iter.next() {
            match item {
                WireItem::Text(text) => patch.0.push(PatchOp::Literal(text)),
                WireItem::Offset(start) => {
                    // A number directly after a number is the end of the range.
                    let end = match iter.peek() {
                        Some(WireItem::Offset(end)) => {
                            let end = *end as usize;
                            iter.next();
                            Some(end)
                        }
                        _ => None,
                    };
                    patch.push_copy(start as usize, end);
                }
            }
        }
        Ok(patch)
    }
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(PatchVisitor)
    }
}
