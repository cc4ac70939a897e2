//! Normalization of raw API payloads.
//!
//! The cluster is inconsistent about wire types: the same setting may come
//! back as `1` on one endpoint and `"1"` on another. Every payload is pushed
//! through an ordered list of pure [`Stage`]s so that declared and observed
//! content can be compared value for value.

mod coerce;
mod pipeline;

pub use coerce::{coerce, deep_to_int, deep_to_string};
pub use pipeline::{Pipeline, Stage};
