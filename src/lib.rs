// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # searchsync
//!
//! Declarative, idempotent reconciliation for the administrative objects of
//! a search cluster: index settings, ingest pipelines, templates, security
//! roles and users, the license and cluster settings.
//!
//! ## Overview
//!
//! Operators declare objects in `searchsync.yaml`. Each pass reads what the
//! cluster currently holds, compares it against the declaration and issues
//! only the writes needed to converge. Replaying a pass on a converged
//! cluster issues no writes.
//!
//! ## Architecture
//!
//! 1. **Desired State**: [`record::DesiredRecord`]s from configuration
//! 2. **Observed State**: [`discovery::Discoverer`] reads each kind once per pass
//!    and normalizes the payloads through the kind's [`normalize::Pipeline`]
//! 3. **Reconciler**: the asymmetric comparator decides create, update, delete
//!    or nothing, and [`planner::MutationExecutor`] applies it
//!
//! Per-kind differences (addressing, normalization, exclusions) live in data,
//! not code: see [`kind::ResourceKind`].
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`transport`]: HTTP transport to the cluster's REST API
//! - [`normalize`]: Payload normalization stages
//! - [`kind`]: Kind descriptors, addressing and the built-in registry
//! - [`discovery`]: Per-kind discovery of current objects
//! - [`planner`]: Comparison, transition decisions and mutation execution
//! - [`reconciler`]: Pass driver and reports
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! connection:
//!   protocol: https
//!   host: search.internal
//!   username: admin
//!   password: admin
//!
//! resources:
//!   - kind: index
//!     name: logs
//!     content:
//!       index:
//!         number_of_replicas: 1
//!   - kind: pipeline
//!     name: legacy
//!     ensure: absent
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod kind;
pub mod normalize;
pub mod planner;
pub mod reconciler;
pub mod record;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, SyncConfig};
pub use discovery::{Discovered, Discoverer, Observed};
pub use error::{Result, SyncError};
pub use kind::{KindRegistry, ResourceKind};
pub use planner::{ActionType, MutationExecutor};
pub use reconciler::{Inventory, Outcome, OutcomeStatus, PassReport, Reconciler};
pub use record::{CurrentRecord, DesiredRecord, Ensure};
pub use transport::{HttpTransport, Transport};
