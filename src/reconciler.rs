//! Reconciliation driver.
//!
//! A pass discovers each kind once, compares every declared object against
//! what was found and applies the resulting transitions. Kinds run
//! concurrently. Within a prefix kind, writes run through a bounded ordered
//! stream; bare kinds share one collection and are serialized.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{Span, debug, error, info, instrument};
use uuid::Uuid;

use crate::discovery::{Discovered, Discoverer, Observed};
use crate::error::{ConfigError, FailureKind, Result, SyncError};
use crate::kind::{KindRegistry, ResourceKind};
use crate::planner::{ActionType, KeyedDocument, MutationExecutor, decide, validate_declared};
use crate::record::{CurrentRecord, DesiredRecord, Ensure};
use crate::transport::Transport;

/// Default number of concurrent writes within a prefix kind.
pub const DEFAULT_WORKERS: usize = 4;

/// Reconciler for converging the cluster on declared objects.
pub struct Reconciler<'a> {
    /// Transport to the cluster.
    transport: &'a dyn Transport,
    /// Registered kinds.
    registry: &'a KindRegistry,
    /// Concurrent writes within a prefix kind.
    workers: usize,
}

/// Status of one object after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Already converged.
    Unchanged,
    /// A write was issued and accepted.
    Applied,
    /// A write would be issued (dry run).
    Pending,
    /// The object could not be reconciled this pass.
    Failed,
}

/// Result for one declared object.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Kind of the object.
    pub kind: String,
    /// Name of the object.
    pub name: String,
    /// Transition decided for the object.
    pub action: ActionType,
    /// What happened.
    pub status: OutcomeStatus,
    /// Failure classification, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Failure message, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One failure reported by a pass or an audit.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// Kind concerned.
    pub kind: String,
    /// Object concerned; `None` when the whole kind failed.
    pub name: Option<String>,
    /// Failure classification.
    pub failure: FailureKind,
    /// Description of the failure.
    pub message: String,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Identifier of the pass, also carried by its log span.
    pub pass_id: Uuid,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub finished_at: DateTime<Utc>,
    /// Outcomes grouped by kind, in declaration order within a kind.
    pub outcomes: Vec<Outcome>,
}

/// Current objects found by an audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    /// Normalized objects, sorted by kind then name.
    pub records: Vec<CurrentRecord>,
    /// Kinds that could not be read and entries that could not be parsed.
    pub failures: Vec<Failure>,
}

/// Declared objects of one kind, with their position in the declaration.
type Group<'a, 'd> = (&'a ResourceKind, Vec<(usize, &'d DesiredRecord)>);

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(transport: &'a dyn Transport, registry: &'a KindRegistry) -> Self {
        Self {
            transport,
            registry,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Sets the number of concurrent writes within a prefix kind.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 { 1 } else { workers };
        self
    }

    /// Lists every current object of every registered kind.
    ///
    /// A kind that cannot be read is reported as a failure; the others are
    /// still listed.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Inventory {
        let discoverer = Discoverer::new(self.transport);
        let discoverer = &discoverer;
        let reads = join_all(
            self.registry
                .iter()
                .map(|kind| async move { (kind, discoverer.discover(kind).await) }),
        )
        .await;

        let mut inventory = Inventory::default();
        for (kind, read) in reads {
            inventory.absorb(kind, read);
        }
        inventory
    }

    /// Lists every current object of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is not registered.
    pub async fn list_kind(&self, name: &str) -> Result<Inventory> {
        let kind = self.registry.resolve(name)?;
        let read = Discoverer::new(self.transport).discover(kind).await;

        let mut inventory = Inventory::default();
        inventory.absorb(kind, read);
        Ok(inventory)
    }

    /// Computes the transitions a pass would apply, without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared kind is unknown or a (kind, name) pair
    /// is declared twice.
    pub async fn plan(&self, desired: &[DesiredRecord]) -> Result<PassReport> {
        self.pass(desired, true).await
    }

    /// Runs one reconciliation pass.
    ///
    /// Per-object failures are reported in the returned [`PassReport`] and
    /// never stop unrelated objects from converging.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared kind is unknown or a (kind, name) pair
    /// is declared twice.
    pub async fn sync(&self, desired: &[DesiredRecord]) -> Result<PassReport> {
        self.pass(desired, false).await
    }

    #[instrument(skip(self, desired), fields(pass_id = tracing::field::Empty))]
    async fn pass(&self, desired: &[DesiredRecord], dry_run: bool) -> Result<PassReport> {
        let groups = self.group(desired)?;
        let pass_id = Uuid::new_v4();
        Span::current().record("pass_id", tracing::field::display(pass_id));
        let started_at = Utc::now();

        info!(
            "Starting {} of {} object(s) across {} kind(s)",
            if dry_run { "plan" } else { "sync" },
            desired.len(),
            groups.len()
        );

        let per_kind = join_all(
            groups
                .into_iter()
                .map(|(kind, records)| self.reconcile_kind(kind, records, dry_run)),
        )
        .await;

        let report = PassReport {
            pass_id,
            dry_run,
            started_at,
            finished_at: Utc::now(),
            outcomes: per_kind.into_iter().flatten().collect(),
        };

        info!(
            "Pass finished: {} created, {} updated, {} deleted, {} unchanged, {} failed",
            report.count(ActionType::Create),
            report.count(ActionType::Update),
            report.count(ActionType::Delete),
            report.unchanged(),
            report.failed()
        );

        Ok(report)
    }

    /// Groups declared objects by kind, rejecting unknown kinds and duplicates.
    fn group<'d>(&self, desired: &'d [DesiredRecord]) -> std::result::Result<Vec<Group<'a, 'd>>, ConfigError> {
        let mut groups: BTreeMap<&str, Group<'a, 'd>> = BTreeMap::new();
        let mut seen = HashSet::new();

        for (index, record) in desired.iter().enumerate() {
            let kind = self.registry.resolve(&record.kind)?;
            if !seen.insert((record.kind.as_str(), record.name.as_str())) {
                return Err(ConfigError::DuplicateName {
                    kind: record.kind.clone(),
                    name: record.name.clone(),
                });
            }
            groups
                .entry(kind.name.as_str())
                .or_insert_with(|| (kind, Vec::new()))
                .1
                .push((index, record));
        }

        Ok(groups.into_values().collect())
    }

    #[instrument(skip(self, kind, records), fields(kind = %kind.name))]
    async fn reconcile_kind(
        &self,
        kind: &ResourceKind,
        records: Vec<(usize, &DesiredRecord)>,
        dry_run: bool,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(records.len());
        let mut valid = Vec::with_capacity(records.len());

        for (index, desired) in records {
            match validate_declared(kind, desired) {
                Ok(()) => valid.push((index, desired)),
                Err(e) => outcomes.push((index, Outcome::failed(desired, ActionType::Noop, &SyncError::from(e)))),
            }
        }

        if !valid.is_empty() {
            match Discoverer::new(self.transport).discover(kind).await {
                Ok(discovered) => {
                    let applied = if dry_run {
                        Self::preview(kind, &valid, &discovered)
                    } else if kind.is_keyed() {
                        self.apply_keyed(kind, valid, &discovered).await
                    } else if kind.is_bare() {
                        self.apply_serial(kind, valid, &discovered).await
                    } else {
                        self.apply_concurrent(kind, valid, &discovered).await
                    };
                    outcomes.extend(applied);
                }
                Err(e) => {
                    error!("Discovery of {} failed: {e}", kind.name);
                    outcomes.extend(
                        valid
                            .into_iter()
                            .map(|(index, desired)| (index, Outcome::failed(desired, ActionType::Noop, &e))),
                    );
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn preview(
        kind: &ResourceKind,
        records: &[(usize, &DesiredRecord)],
        discovered: &Discovered,
    ) -> Vec<(usize, Outcome)> {
        records
            .iter()
            .map(|&(index, desired)| {
                let outcome = match observe(discovered, desired) {
                    Err(e) => Outcome::failed(desired, ActionType::Noop, &e),
                    Ok(current) => {
                        let action = decide(kind, desired, current);
                        let status = if action.is_write() {
                            OutcomeStatus::Pending
                        } else {
                            OutcomeStatus::Unchanged
                        };
                        Outcome::new(desired, action, status)
                    }
                };
                (index, outcome)
            })
            .collect()
    }

    async fn apply_concurrent(
        &self,
        kind: &ResourceKind,
        records: Vec<(usize, &DesiredRecord)>,
        discovered: &Discovered,
    ) -> Vec<(usize, Outcome)> {
        let executor = MutationExecutor::new(self.transport);
        let executor = &executor;

        stream::iter(records)
            .map(|(index, desired)| async move { (index, apply_one(executor, kind, desired, discovered).await) })
            .buffered(self.workers)
            .collect()
            .await
    }

    async fn apply_serial(
        &self,
        kind: &ResourceKind,
        records: Vec<(usize, &DesiredRecord)>,
        discovered: &Discovered,
    ) -> Vec<(usize, Outcome)> {
        let executor = MutationExecutor::new(self.transport);
        let mut outcomes = Vec::with_capacity(records.len());

        for (index, desired) in records {
            outcomes.push((index, apply_one(&executor, kind, desired, discovered).await));
        }

        outcomes
    }

    async fn apply_keyed(
        &self,
        kind: &ResourceKind,
        records: Vec<(usize, &DesiredRecord)>,
        discovered: &Discovered,
    ) -> Vec<(usize, Outcome)> {
        let executor = MutationExecutor::new(self.transport);
        let mut document = KeyedDocument::new(kind, discovered.document.clone().unwrap_or_default());
        let mut outcomes = Vec::with_capacity(records.len());
        let mut staged = Vec::new();

        for (index, desired) in records {
            let action = match observe(discovered, desired) {
                Ok(current) => decide(kind, desired, current),
                Err(e) => {
                    outcomes.push((index, Outcome::failed(desired, ActionType::Noop, &e)));
                    continue;
                }
            };

            if !action.is_write() {
                outcomes.push((index, Outcome::new(desired, action, OutcomeStatus::Unchanged)));
                continue;
            }

            if kind.batched {
                document.stage(desired, action);
                staged.push((index, desired, action));
                continue;
            }

            let snapshot = document.clone();
            document.stage(desired, action);
            let outcome = match executor.flush(&mut document).await {
                Ok(_) => Outcome::new(desired, action, OutcomeStatus::Applied),
                Err(e) => {
                    document = snapshot;
                    Outcome::failed(desired, action, &e)
                }
            };
            outcomes.push((index, outcome));
        }

        if !staged.is_empty() {
            let flushed = executor.flush(&mut document).await;
            for (index, desired, action) in staged {
                let outcome = match &flushed {
                    Ok(_) => Outcome::new(desired, action, OutcomeStatus::Applied),
                    Err(e) => Outcome::failed(desired, action, e),
                };
                outcomes.push((index, outcome));
            }
        }

        outcomes
    }
}

/// Resolves what discovery saw for one declared object.
///
/// A malformed entry is an error: its state is unknown and it must not be
/// recreated. A singleton at its default body is already removed, but a
/// present declaration still compares against its content.
fn observe<'d>(
    discovered: &'d Discovered,
    desired: &DesiredRecord,
) -> std::result::Result<Option<&'d CurrentRecord>, SyncError> {
    match discovered.lookup(&desired.name) {
        Observed::Present(current) => Ok(Some(current)),
        Observed::Reset(current) => Ok((desired.ensure == Ensure::Present).then_some(current)),
        Observed::Missing => Ok(None),
        Observed::Malformed(e) => Err(e.clone().into()),
    }
}

async fn apply_one(
    executor: &MutationExecutor<'_>,
    kind: &ResourceKind,
    desired: &DesiredRecord,
    discovered: &Discovered,
) -> Outcome {
    let current = match observe(discovered, desired) {
        Ok(current) => current,
        Err(e) => return Outcome::failed(desired, ActionType::Noop, &e),
    };

    let action = decide(kind, desired, current);
    match executor.execute(kind, desired, action).await {
        Ok(()) if action.is_write() => Outcome::new(desired, action, OutcomeStatus::Applied),
        Ok(()) => Outcome::new(desired, action, OutcomeStatus::Unchanged),
        Err(e) => Outcome::failed(desired, action, &e),
    }
}

impl Outcome {
    fn new(desired: &DesiredRecord, action: ActionType, status: OutcomeStatus) -> Self {
        Self {
            kind: desired.kind.clone(),
            name: desired.name.clone(),
            action,
            status,
            failure: None,
            message: None,
        }
    }

    fn failed(desired: &DesiredRecord, action: ActionType, err: &SyncError) -> Self {
        error!("{} '{}' failed: {err}", desired.kind, desired.name);
        Self {
            failure: Some(err.failure_kind()),
            message: Some(err.to_string()),
            ..Self::new(desired, action, OutcomeStatus::Failed)
        }
    }

    /// Returns true if the object failed this pass.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

impl Inventory {
    fn absorb(&mut self, kind: &ResourceKind, read: Result<Discovered>) {
        match read {
            Ok(discovered) => {
                for (name, e) in discovered.malformed {
                    self.failures.push(Failure {
                        kind: kind.name.clone(),
                        name: Some(name),
                        failure: FailureKind::Parse,
                        message: e.to_string(),
                    });
                }
                self.records.extend(discovered.records.into_values());
            }
            Err(e) => {
                error!("Listing {} failed: {e}", kind.name);
                self.failures.push(Failure {
                    kind: kind.name.clone(),
                    name: None,
                    failure: e.failure_kind(),
                    message: e.to_string(),
                });
            }
        }
        debug!("Inventory holds {} object(s)", self.records.len());
    }
}

impl PassReport {
    /// Number of objects whose decided transition was `action` and did not fail.
    #[must_use]
    pub fn count(&self, action: ActionType) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && !o.is_failed())
            .count()
    }

    /// Number of converged objects.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Unchanged)
            .count()
    }

    /// Number of failed objects.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Returns true if no object failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Number of writes issued (or, for a dry run, that would be issued).
    #[must_use]
    pub fn changes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Applied | OutcomeStatus::Pending))
            .count()
    }

    /// Per-object failures of the pass.
    #[must_use]
    pub fn failures(&self) -> Vec<Failure> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| Failure {
                kind: o.kind.clone(),
                name: Some(o.name.clone()),
                failure: o.failure.unwrap_or(FailureKind::Internal),
                message: o.message.clone().unwrap_or_default(),
            })
            .collect()
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Applied => "applied",
            Self::Pending => "pending",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "Plan" } else { "Sync" };
        let status = if self.is_success() { "successful" } else { "failed" };
        writeln!(f, "{verb} {status} (pass {}):", self.pass_id)?;
        writeln!(f, "  Created: {}", self.count(ActionType::Create))?;
        writeln!(f, "  Updated: {}", self.count(ActionType::Update))?;
        writeln!(f, "  Deleted: {}", self.count(ActionType::Delete))?;
        writeln!(f, "  Unchanged: {}", self.unchanged())?;

        let failures = self.failures();
        if !failures.is_empty() {
            writeln!(f, "  Failed:")?;
            for failure in &failures {
                writeln!(f, "    - {failure}")?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} '{}' [{}]: {}", self.kind, name, self.failure, self.message),
            None => write!(f, "{} [{}]: {}", self.kind, self.failure, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiRequest, ApiResponse, Method, MockTransport};
    use serde_json::{Value, json};

    fn content(value: Value) -> crate::record::Content {
        match value {
            Value::Object(map) => map,
            _ => crate::record::Content::new(),
        }
    }

    fn ok(body: &str) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    fn is_get(request: &ApiRequest, path: &str) -> bool {
        request.method == Method::Get && request.path == path
    }

    #[tokio::test]
    async fn test_unknown_kind_is_fatal() {
        let registry = KindRegistry::with_builtins();
        let transport = MockTransport::new();
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [DesiredRecord::present("widget", "w1", Default::default())];
        let err = reconciler.sync(&desired).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::UnknownKind { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_declaration_is_fatal() {
        let registry = KindRegistry::with_builtins();
        let transport = MockTransport::new();
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [
            DesiredRecord::present("pipeline", "p1", Default::default()),
            DesiredRecord::absent("pipeline", "p1"),
        ];
        let err = reconciler.sync(&desired).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::DuplicateName { .. })));
    }

    #[tokio::test]
    async fn test_invalid_declaration_never_reaches_the_network() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [DesiredRecord::present("license", "lic", content(json!({"license": "x"})))];
        let report = reconciler.sync(&desired).await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[0].failure, Some(FailureKind::Validation));
    }

    #[tokio::test]
    async fn test_malformed_entry_is_not_recreated() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_all/_settings"))
            .times(1)
            .returning(|_| Ok(ok(r#"{"idx1": {"mappings": {}}}"#)));
        transport
            .expect_send()
            .withf(ApiRequest::is_write)
            .times(0);
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [DesiredRecord::present(
            "index",
            "idx1",
            content(json!({"index": {"number_of_shards": 1}})),
        )];
        let report = reconciler.sync(&desired).await.unwrap();
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(report.outcomes[0].failure, Some(FailureKind::Parse));
    }

    #[tokio::test]
    async fn test_default_cluster_settings_are_neither_recreated_nor_reset() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_cluster/settings"))
            .times(2)
            .returning(|_| Ok(ok(r#"{"persistent":{},"transient":{}}"#)));
        transport
            .expect_send()
            .withf(ApiRequest::is_write)
            .times(0);
        let reconciler = Reconciler::new(&transport, &registry);

        let present = [DesiredRecord::present(
            "cluster_settings",
            "cluster_settings",
            content(json!({"persistent": {}})),
        )];
        let report = reconciler.sync(&present).await.unwrap();
        assert_eq!(report.outcomes[0].action, ActionType::Noop);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Unchanged);

        let absent = [DesiredRecord::absent("cluster_settings", "cluster_settings")];
        let report = reconciler.sync(&absent).await.unwrap();
        assert_eq!(report.outcomes[0].action, ActionType::Noop);
    }

    #[tokio::test]
    async fn test_failure_isolation_across_objects() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_template"))
            .times(1)
            .returning(|_| Ok(ok("{}")));
        transport
            .expect_send()
            .withf(|request| request.method == Method::Put && request.path == "_template/bad")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse {
                    status: 400,
                    body: String::from("mapper_parsing_exception"),
                })
            });
        transport
            .expect_send()
            .withf(|request| request.method == Method::Put && request.path == "_template/good")
            .times(1)
            .returning(|_| Ok(ok("{}")));
        let reconciler = Reconciler::new(&transport, &registry).with_workers(2);

        let desired = [
            DesiredRecord::present("template", "bad", content(json!({"order": 1}))),
            DesiredRecord::present("template", "good", content(json!({"order": 2}))),
        ];
        let report = reconciler.sync(&desired).await.unwrap();

        assert_eq!(report.outcomes[0].name, "bad");
        assert_eq!(report.outcomes[0].failure, Some(FailureKind::Apply));
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Applied);
        assert_eq!(report.count(ActionType::Create), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_discovery_failure_fails_only_that_kind() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_plugins/_security/api/roles"))
            .returning(|_| {
                Ok(ApiResponse {
                    status: 500,
                    body: String::from("boom"),
                })
            });
        transport
            .expect_send()
            .withf(|request| is_get(request, "_ingest/pipeline"))
            .returning(|_| Ok(ok(r#"{"p1": {"description": "x"}}"#)));
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [
            DesiredRecord::present("role", "r1", Default::default()),
            DesiredRecord::present("pipeline", "p1", content(json!({"description": "x"}))),
        ];
        let report = reconciler.sync(&desired).await.unwrap();

        let role = report.outcomes.iter().find(|o| o.kind == "role").unwrap();
        assert_eq!(role.failure, Some(FailureKind::Transport));
        let pipeline = report.outcomes.iter().find(|o| o.kind == "pipeline").unwrap();
        assert_eq!(pipeline.status, OutcomeStatus::Unchanged);
    }

    #[tokio::test]
    async fn test_plan_does_not_write() {
        let registry = KindRegistry::with_builtins();
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_ingest/pipeline"))
            .times(1)
            .returning(|_| Ok(ok(r#"{"p1": {"description": "old"}}"#)));
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [
            DesiredRecord::present("pipeline", "p1", content(json!({"description": "new"}))),
            DesiredRecord::absent("pipeline", "p2"),
        ];
        let report = reconciler.plan(&desired).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.outcomes[0].action, ActionType::Update);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Pending);
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Unchanged);
        assert_eq!(report.changes(), 1);
    }

    #[tokio::test]
    async fn test_keyed_failure_rolls_back_the_working_copy() {
        let mut registry = KindRegistry::new();
        registry.register(ResourceKind::keyed("store", "_store")).unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_store"))
            .times(1)
            .returning(|_| Ok(ok(r#"{"keep": {"v": 0}}"#)));
        transport
            .expect_send()
            .withf(|request| {
                request.method == Method::Put
                    && request.body.as_ref().is_some_and(|body| body.get("a").is_some())
            })
            .times(1)
            .returning(|_| {
                Ok(ApiResponse {
                    status: 400,
                    body: String::from("rejected"),
                })
            });
        transport
            .expect_send()
            .withf(|request| {
                request.method == Method::Put
                    && request.body == Some(json!({"keep": {"v": 0}, "b": {"v": 2}}))
            })
            .times(1)
            .returning(|_| Ok(ok("{}")));
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [
            DesiredRecord::present("store", "a", content(json!({"v": 1}))),
            DesiredRecord::present("store", "b", content(json!({"v": 2}))),
        ];
        let report = reconciler.sync(&desired).await.unwrap();

        assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Applied);
    }

    #[tokio::test]
    async fn test_batched_kind_flushes_once() {
        let mut registry = KindRegistry::new();
        registry
            .register(ResourceKind::keyed("secrets", "_secrets").batched())
            .unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_get(request, "_secrets"))
            .times(1)
            .returning(|_| Ok(ok(r#"{"old": {"v": 0}, "same": {"v": 5}}"#)));
        transport
            .expect_send()
            .withf(|request| {
                request.method == Method::Put
                    && request.body == Some(json!({"same": {"v": 5}, "s1": {"v": 1}, "s2": {"v": 2}}))
            })
            .times(1)
            .returning(|_| Ok(ok("{}")));
        let reconciler = Reconciler::new(&transport, &registry);

        let desired = [
            DesiredRecord::present("secrets", "s1", content(json!({"v": 1}))),
            DesiredRecord::present("secrets", "s2", content(json!({"v": 2}))),
            DesiredRecord::present("secrets", "same", content(json!({"v": 5}))),
            DesiredRecord::absent("secrets", "old"),
        ];
        let report = reconciler.sync(&desired).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.count(ActionType::Create), 2);
        assert_eq!(report.count(ActionType::Delete), 1);
        assert_eq!(report.unchanged(), 1);
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["s1", "s2", "same", "old"]);
    }
}
