//! Asymmetric comparison of declared against observed content.
//!
//! Only keys the operator declared take part. Anything the cluster adds on
//! its own (creation dates, UUIDs, version stamps) is ignored, so a declared
//! subset of an object is in sync as long as every declared leaf matches.

use serde_json::Value;

use crate::kind::{FieldPath, ResourceKind};
use crate::record::Content;

/// Returns true when every declared key is present and equal in `normalized`.
///
/// An empty declaration is vacuously in sync.
#[must_use]
pub fn in_sync(declared: &Content, normalized: &Content) -> bool {
    declared.iter().all(|(key, want)| {
        normalized
            .get(key)
            .is_some_and(|have| value_in_sync(want, have))
    })
}

/// Compares one declared value against one normalized value.
///
/// Mappings recurse; scalars and sequences must be equal.
#[must_use]
pub fn value_in_sync(declared: &Value, normalized: &Value) -> bool {
    match (declared, normalized) {
        (Value::Object(want), Value::Object(have)) => in_sync(want, have),
        (want, have) => want == have,
    }
}

/// Removes excluded sub-fields from declared content before comparison.
#[must_use]
pub fn strip_exclusions(declared: &Content, exclusions: &[FieldPath]) -> Content {
    let mut stripped = declared.clone();
    for path in exclusions {
        remove_path(&mut stripped, path.segments());
    }
    stripped
}

/// Compares declared content against a discovered object the way `kind` wants.
///
/// Declared content gets the kind's leaf coercion and exclusions first; the
/// observed side is already normalized by discovery.
#[must_use]
pub fn kind_in_sync(kind: &ResourceKind, declared: &Content, normalized: &Content) -> bool {
    let declared = kind.pipeline.coerce_declared(declared);
    let declared = strip_exclusions(&declared, &kind.compare_exclusions);
    in_sync(&declared, normalized)
}

fn remove_path(map: &mut Content, segments: &[String]) {
    match segments {
        [] => {}
        [last] if last == "*" => map.clear(),
        [last] => {
            map.remove(last);
        }
        [head, rest @ ..] if head == "*" => {
            for value in map.values_mut() {
                if let Value::Object(inner) = value {
                    remove_path(inner, rest);
                }
            }
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}
