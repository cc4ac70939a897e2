//! Resource kinds.
//!
//! A kind bundles everything that differs between object types: where they
//! are read from, where they are written to, how payloads are normalized and
//! which declared fields the comparator ignores.

mod addressing;
mod descriptor;
mod registry;

pub use addressing::{
    delete_request, discovery_request, document_request, object_path, wrap, write_request,
};
pub use descriptor::{
    AddressingStyle, BareLayout, DeleteStrategy, FieldPath, NAME_PLACEHOLDER, ResourceKind,
    WriteMethod,
};
pub use registry::{KindRegistry, builtin_kinds, default_api_path};
