//! Mutation executor.
//!
//! Turns a decided transition into HTTP calls. Any non-2xx response becomes
//! an [`ApplyError`] carrying status and body. Writes are sent exactly once:
//! a timed-out write has an unknown effect and is left to the next pass.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ApplyError, Result};
use crate::kind::{self, ResourceKind};
use crate::record::{Content, CurrentRecord, DesiredRecord};
use crate::transport::{ApiRequest, ApiResponse, Transport};

use super::plan::{ActionType, decide};
use super::redact::display as render;

/// Executor for object mutations.
pub struct MutationExecutor<'a> {
    /// Transport to the cluster.
    transport: &'a dyn Transport,
}

/// Working copy of a keyed bare document.
///
/// Starts from the raw discovered document so that entries the pass does not
/// declare, including ones that failed normalization, are written back as is.
#[derive(Debug, Clone)]
pub struct KeyedDocument<'k> {
    /// Kind the document belongs to.
    kind: &'k ResourceKind,
    /// Name-keyed raw document.
    document: Content,
    /// Names changed since the last flush.
    pending: Vec<String>,
}

impl<'a> MutationExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Decides and applies the transition for one object.
    ///
    /// Returns the action taken. Replaying on a converged object issues no
    /// request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the cluster rejects it.
    pub async fn apply(
        &self,
        kind: &ResourceKind,
        desired: &DesiredRecord,
        current: Option<&CurrentRecord>,
    ) -> Result<ActionType> {
        let action = decide(kind, desired, current);
        self.execute(kind, desired, action).await?;
        Ok(action)
    }

    /// Applies an already decided transition for one object.
    ///
    /// Keyed bare kinds go through [`KeyedDocument`] and [`Self::flush`]
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the cluster rejects it.
    pub async fn execute(&self, kind: &ResourceKind, desired: &DesiredRecord, action: ActionType) -> Result<()> {
        let request = match action {
            ActionType::Noop => return Ok(()),
            ActionType::Create => kind::write_request(kind, &desired.name, &desired.content, false),
            ActionType::Update => kind::write_request(kind, &desired.name, &desired.content, true),
            ActionType::Delete => kind::delete_request(kind, &desired.name),
        };

        match action {
            ActionType::Delete => info!("Deleting {} '{}'", kind.name, desired.name),
            _ => {
                let shown = render(kind, &desired.content);
                info!("Writing {} '{}' ({action}): {shown}", kind.name, desired.name);
            }
        }

        self.send(&request).await.map(|_| ())
    }

    /// Writes a keyed document if anything in it changed.
    ///
    /// Returns the names covered by the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the cluster rejects it. The
    /// pending names are still drained; all of them failed together.
    pub async fn flush(&self, document: &mut KeyedDocument<'_>) -> Result<Vec<String>> {
        let names = std::mem::take(&mut document.pending);
        if names.is_empty() {
            return Ok(names);
        }

        info!(
            "Writing {} document covering {} change(s): {}",
            document.kind.name,
            names.len(),
            names.join(", ")
        );
        self.send(&document.request()).await?;
        Ok(names)
    }

    /// Sends a request and maps non-2xx statuses to [`ApplyError`].
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        debug!("Sending {request}");
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(ApplyError {
                method: request.method.to_string(),
                path: request.path.clone(),
                status: response.status,
                body: response.body,
            }
            .into());
        }

        Ok(response)
    }
}

impl<'k> KeyedDocument<'k> {
    /// Creates a working copy from the raw discovered document.
    #[must_use]
    pub const fn new(kind: &'k ResourceKind, document: Content) -> Self {
        Self {
            kind,
            document,
            pending: Vec::new(),
        }
    }

    /// Records one transition in the working copy.
    pub fn stage(&mut self, desired: &DesiredRecord, action: ActionType) {
        match action {
            ActionType::Noop => return,
            ActionType::Create | ActionType::Update => {
                let entry = kind::wrap(self.kind.body_envelope.as_deref(), &desired.content);
                self.document.insert(desired.name.clone(), entry);
            }
            ActionType::Delete => {
                self.document.remove(&desired.name);
            }
        }
        self.pending.push(desired.name.clone());
    }

    /// Returns true when there is something to flush.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the raw entry currently held for `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    /// Builds the whole-document write.
    #[must_use]
    pub fn request(&self) -> ApiRequest {
        kind::document_request(self.kind, &self.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SyncError, TransportError};
    use crate::kind::KindRegistry;
    use crate::transport::{Method, MockTransport};
    use serde_json::json;

    fn content(value: Value) -> Content {
        match value {
            Value::Object(map) => map,
            _ => Content::new(),
        }
    }

    fn ok() -> ApiResponse {
        ApiResponse {
            status: 200,
            body: String::from(r#"{"acknowledged":true}"#),
        }
    }

    #[tokio::test]
    async fn test_create_writes_declared_body() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("index").unwrap();
        let desired = DesiredRecord::present("index", "idx1", content(json!({"index": {"number_of_shards": 1}})));

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.method == Method::Put
                    && request.path == "idx1"
                    && request.query.is_empty()
                    && request.body == Some(json!({"index": {"number_of_shards": 1}}))
            })
            .times(1)
            .returning(|_| Ok(ok()));

        let executor = MutationExecutor::new(&transport);
        let action = executor.apply(kind, &desired, None).await.unwrap();
        assert_eq!(action, ActionType::Create);
    }

    #[tokio::test]
    async fn test_logged_redaction_leaves_the_payload_intact() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("user").unwrap();
        let desired = DesiredRecord::present(
            "user",
            "alice",
            content(json!({"password": "s3cret", "backend_roles": ["admin"]})),
        );

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.path == "_plugins/_security/api/internalusers/alice"
                    && request.body == Some(json!({"password": "s3cret", "backend_roles": ["admin"]}))
            })
            .times(1)
            .returning(|_| Ok(ok()));

        let executor = MutationExecutor::new(&transport);
        executor.execute(kind, &desired, ActionType::Create).await.unwrap();
        assert!(!render(kind, &desired.content).contains("s3cret"));
    }

    #[tokio::test]
    async fn test_index_update_targets_settings_endpoint() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("index").unwrap();
        let desired = DesiredRecord::present("index", "idx1", content(json!({"index": {"number_of_replicas": 2}})));
        let current = CurrentRecord::discovered("index", "idx1", content(json!({"index": {"number_of_replicas": 1}})));

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| request.method == Method::Put && request.path == "idx1/_settings")
            .times(1)
            .returning(|_| Ok(ok()));

        let executor = MutationExecutor::new(&transport);
        let action = executor.apply(kind, &desired, Some(&current)).await.unwrap();
        assert_eq!(action, ActionType::Update);
    }

    #[tokio::test]
    async fn test_converged_object_issues_no_request() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("pipeline").unwrap();
        let desired = DesiredRecord::present("pipeline", "p1", content(json!({"description": "x"})));
        let current = CurrentRecord::discovered("pipeline", "p1", content(json!({"description": "x", "processors": []})));

        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let executor = MutationExecutor::new(&transport);
        let action = executor.apply(kind, &desired, Some(&current)).await.unwrap();
        assert_eq!(action, ActionType::Noop);
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_apply_error() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("pipeline").unwrap();
        let desired = DesiredRecord::absent("pipeline", "p1");
        let current = CurrentRecord::discovered("pipeline", "p1", Content::new());

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| request.method == Method::Delete && request.path == "_ingest/pipeline/p1")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse {
                    status: 403,
                    body: String::from("forbidden"),
                })
            });

        let executor = MutationExecutor::new(&transport);
        let err = executor.apply(kind, &desired, Some(&current)).await.unwrap_err();
        match err {
            SyncError::Apply(apply) => {
                assert_eq!(apply.status, 403);
                assert_eq!(apply.body, "forbidden");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timed_out_write_is_not_retried() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("template").unwrap();
        let desired = DesiredRecord::present("template", "t1", content(json!({"order": 1})));

        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Err(TransportError::Timeout {
                message: String::from("deadline exceeded"),
            })
        });

        let executor = MutationExecutor::new(&transport);
        let err = executor.apply(kind, &desired, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(TransportError::Timeout { .. })));
    }

    #[test]
    fn test_keyed_document_keeps_untouched_entries() {
        let kind = ResourceKind::keyed("pipelines", "_pipelines");
        let raw = content(json!({"p1": {"v": 1}, "p2": {"v": 2}}));
        let mut document = KeyedDocument::new(&kind, raw);

        document.stage(&DesiredRecord::absent("pipelines", "p1"), ActionType::Delete);
        document.stage(
            &DesiredRecord::present("pipelines", "p3", content(json!({"v": 3}))),
            ActionType::Create,
        );

        assert!(document.has_pending());
        assert_eq!(document.entry("p1"), None);
        assert_eq!(document.entry("p2"), Some(&json!({"v": 2})));

        let request = document.request();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "_pipelines");
        assert_eq!(request.body, Some(json!({"p2": {"v": 2}, "p3": {"v": 3}})));
    }

    #[test]
    fn test_flush_of_clean_document_sends_nothing() {
        let kind = ResourceKind::keyed("pipelines", "_pipelines");
        let mut document = KeyedDocument::new(&kind, Content::new());
        document.stage(&DesiredRecord::absent("pipelines", "p1"), ActionType::Noop);

        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let executor = MutationExecutor::new(&transport);
        let names = tokio_test::block_on(executor.flush(&mut document)).unwrap();
        assert!(names.is_empty());
    }
}
