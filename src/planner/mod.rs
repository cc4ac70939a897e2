//! Comparison, transition decisions and mutation execution.
//!
//! This module decides what must change for each declared object and
//! issues the writes that converge the cluster.

mod compare;
mod executor;
mod plan;
mod redact;

pub use compare::{in_sync, kind_in_sync, strip_exclusions, value_in_sync};
pub use executor::{KeyedDocument, MutationExecutor};
pub use plan::{ActionType, decide, validate_declared};
pub use redact::{REDACTED, display, redact};
