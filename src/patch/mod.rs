//! Bounded text diff and patch.
//!
//! Subscriptions push the difference between the last snapshot a client saw
//! and the current one. The diff is a cheap heuristic rather than a minimal
//! edit script: it scans both strings in lock-step, realigns after a
//! mismatch within a fixed global search budget, and falls back to literal
//! text when it cannot.
//!
//! # Example
//!
//! ```
//! use livesync::patch::{apply, diff};
//!
//! let before = r#"{ foo: "bar", baz: "qux" }"#;
//! let after = r#"{ foo: "barrister", baz: "qux" }"#;
//!
//! let patch = diff(before, after);
//! assert_eq!(serde_json::to_string(&patch).unwrap(), r#"[0,11,"rister",11]"#);
//! assert_eq!(apply(before, &patch), after);
//! ```

mod diff;
mod ops;

pub use diff::{diff, SEARCH_BUDGET};
pub use ops::{apply, Patch, PatchOp};
