//! Discovery of current objects.
//!
//! One collection read per kind per pass. Every entry is normalized on its
//! own: a malformed entry is set aside without hiding its siblings, and its
//! object is reported as failed rather than treated as missing.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{ParseError, Result, TransportError};
use crate::kind::{self, DeleteStrategy, ResourceKind};
use crate::record::{Content, CurrentRecord};
use crate::transport::Transport;

/// Observer of current cluster objects.
pub struct Discoverer<'a> {
    /// Transport to the cluster.
    transport: &'a dyn Transport,
}

/// Everything one discovery read produced for a kind.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Kind name.
    pub kind: String,
    /// Normalized objects by name.
    pub records: BTreeMap<String, CurrentRecord>,
    /// Entries whose payload could not be normalized.
    pub malformed: BTreeMap<String, ParseError>,
    /// Raw name-keyed document, for keyed bare kinds only.
    pub document: Option<Content>,
    /// Name every declared object maps to, for singleton kinds only.
    pub singleton: Option<String>,
    /// The singleton holds exactly its write-default body.
    pub reset: bool,
}

/// What discovery knows about one declared name.
#[derive(Debug, Clone, Copy)]
pub enum Observed<'d> {
    /// The object exists.
    Present(&'d CurrentRecord),
    /// The singleton exists but holds its write-default body. Counts as
    /// absent for removal only.
    Reset(&'d CurrentRecord),
    /// The object does not exist.
    Missing,
    /// The object's state is unknown.
    Malformed(&'d ParseError),
}

impl<'a> Discoverer<'a> {
    /// Creates a new discoverer.
    #[must_use]
    pub const fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Reads and normalizes every current object of `kind`.
    ///
    /// A 404 or an empty body means no objects exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, returns any other non-2xx status,
    /// or the body is not a JSON document of the expected shape.
    #[instrument(skip_all, fields(kind = %kind.name))]
    pub async fn discover(&self, kind: &ResourceKind) -> Result<Discovered> {
        let request = kind::discovery_request(kind);
        debug!("Discovering {} via {request}", kind.name);

        let response = self.transport.send(&request).await?;
        let mut discovered = Discovered::empty(kind);

        if response.is_not_found() || (response.is_success() && response.body.trim().is_empty()) {
            debug!("No {} objects exist", kind.name);
            return Ok(discovered);
        }

        if !response.is_success() {
            return Err(TransportError::UnexpectedStatus {
                status: response.status,
                path: request.path,
                body: response.body,
            }
            .into());
        }

        let raw: Value = serde_json::from_str(&response.body)
            .map_err(|e| ParseError::payload(format!("invalid JSON from {}: {e}", request.path)))?;

        if let Some(name) = discovered.singleton.clone() {
            discovered.absorb_singleton(kind, &name, raw);
        } else {
            let Value::Object(entries) = raw else {
                return Err(ParseError::payload(format!(
                    "expected a name-keyed mapping from {}",
                    request.path
                ))
                .into());
            };

            if kind.is_keyed() {
                discovered.document = Some(entries.clone());
            }
            for (name, entry) in entries {
                discovered.absorb_entry(kind, name, entry);
            }
        }

        info!(
            "Discovered {} {} object(s){}",
            discovered.records.len(),
            kind.name,
            if discovered.malformed.is_empty() {
                String::new()
            } else {
                format!(", {} malformed", discovered.malformed.len())
            }
        );

        Ok(discovered)
    }
}

impl Discovered {
    /// Creates an empty result for `kind`.
    #[must_use]
    pub fn empty(kind: &ResourceKind) -> Self {
        Self {
            kind: kind.name.clone(),
            records: BTreeMap::new(),
            malformed: BTreeMap::new(),
            document: kind.is_keyed().then(Content::new),
            singleton: if kind.is_singleton() {
                kind.default_name.clone()
            } else {
                None
            },
            reset: false,
        }
    }

    /// Looks up a declared name.
    ///
    /// For singleton kinds every name resolves to the single object.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Observed<'_> {
        let key = self.singleton.as_deref().unwrap_or(name);

        if let Some(error) = self.malformed.get(key) {
            return Observed::Malformed(error);
        }
        match self.records.get(key) {
            Some(record) if self.reset => Observed::Reset(record),
            Some(record) => Observed::Present(record),
            None => Observed::Missing,
        }
    }

    /// Returns the current objects sorted by name.
    #[must_use]
    pub fn current(&self) -> Vec<&CurrentRecord> {
        self.records.values().collect()
    }

    fn absorb_entry(&mut self, kind: &ResourceKind, name: String, entry: Value) {
        match kind.pipeline.run(entry) {
            Ok(content) => {
                let record = CurrentRecord::discovered(&kind.name, &name, content);
                self.records.insert(name, record);
            }
            Err(e) => {
                let error = e.for_entry(&name);
                warn!("Skipping malformed {} entry: {error}", kind.name);
                self.malformed.insert(name, error);
            }
        }
    }

    fn absorb_singleton(&mut self, kind: &ResourceKind, name: &str, raw: Value) {
        if raw.as_object().is_some_and(serde_json::Map::is_empty) {
            return;
        }

        match kind.pipeline.run(raw) {
            Ok(content) => {
                if is_default(kind, &content) {
                    debug!("{} holds its default document", kind.name);
                    self.reset = true;
                }
                let record = CurrentRecord::discovered(&kind.name, name, content);
                self.records.insert(name.to_string(), record);
            }
            Err(e) => {
                let error = e.for_entry(name);
                warn!("Malformed {} document: {error}", kind.name);
                self.malformed.insert(name.to_string(), error);
            }
        }
    }
}

/// Whether a singleton's normalized body equals its normalized default.
fn is_default(kind: &ResourceKind, content: &Content) -> bool {
    match &kind.delete {
        DeleteStrategy::WriteDefault { body } => kind
            .pipeline
            .run(body.clone())
            .is_ok_and(|default| &default == content),
        DeleteStrategy::Verb => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::kind::KindRegistry;
    use crate::transport::{ApiResponse, MockTransport};
    use serde_json::json;

    fn respond(status: u16, body: &str) -> MockTransport {
        let body = body.to_string();
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(move |_| {
            Ok(ApiResponse {
                status,
                body: body.clone(),
            })
        });
        transport
    }

    #[tokio::test]
    async fn test_not_found_and_empty_body_mean_no_objects() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("index").unwrap();

        for (status, body) in [(404, r#"{"error":"no such index"}"#), (200, ""), (200, "  \n")] {
            let transport = respond(status, body);
            let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
            assert!(discovered.records.is_empty());
            assert!(matches!(discovered.lookup("idx1"), Observed::Missing));
        }
    }

    #[tokio::test]
    async fn test_other_statuses_are_transport_errors() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("role").unwrap();
        let transport = respond(503, "unavailable");

        let err = Discoverer::new(&transport).discover(kind).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Transport(TransportError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_parse_error() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("pipeline").unwrap();
        let transport = respond(200, "{not json");

        let err = Discoverer::new(&transport).discover(kind).await.unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[tokio::test]
    async fn test_index_settings_are_unwrapped_and_coerced() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("index").unwrap();
        let body = json!({
            "idx1": {"settings": {"index": {"number_of_shards": "1", "uuid": "abc"}}},
            "idx2": {"settings": {"index": {"number_of_shards": "3"}}}
        });
        let transport = respond(200, &body.to_string());

        let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
        assert_eq!(discovered.records.len(), 2);
        match discovered.lookup("idx1") {
            Observed::Present(record) => {
                assert_eq!(record.content["index"]["number_of_shards"], json!(1));
                assert_eq!(record.content["index"]["uuid"], json!("abc"));
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_entry_is_isolated() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("index").unwrap();
        let body = json!({
            "good": {"settings": {"index": {"number_of_shards": "1"}}},
            "bad": {"mappings": {}}
        });
        let transport = respond(200, &body.to_string());

        let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
        assert!(matches!(discovered.lookup("good"), Observed::Present(_)));
        match discovered.lookup("bad") {
            Observed::Malformed(error) => assert_eq!(error.entry.as_deref(), Some("bad")),
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_singleton_maps_every_name() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("license").unwrap();
        let body = json!({"license": {"uid": "u-1", "type": "basic", "signature": "s"}});
        let transport = respond(200, &body.to_string());

        let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
        assert!(matches!(discovered.lookup("anything"), Observed::Present(_)));
        assert!(matches!(discovered.lookup("license"), Observed::Present(_)));
    }

    #[tokio::test]
    async fn test_singleton_in_default_state_is_reset_not_missing() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("cluster_settings").unwrap();
        let transport = respond(200, r#"{"persistent":{},"transient":{}}"#);

        let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
        match discovered.lookup("cluster_settings") {
            Observed::Reset(record) => assert_eq!(record.content["persistent"], json!({})),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert_eq!(discovered.current().len(), 1);
    }

    #[tokio::test]
    async fn test_singleton_with_settings_is_present() {
        let registry = KindRegistry::with_builtins();
        let kind = registry.resolve("cluster_settings").unwrap();
        let body = json!({"persistent": {"cluster": {"max_shards_per_node": "1000"}}, "transient": {}});
        let transport = respond(200, &body.to_string());

        let discovered = Discoverer::new(&transport).discover(kind).await.unwrap();
        assert!(!discovered.reset);
        assert!(matches!(discovered.lookup("cluster_settings"), Observed::Present(_)));
    }

    #[tokio::test]
    async fn test_keyed_document_is_kept_raw() {
        let kind = ResourceKind::keyed("pipelines", "_pipelines");
        let body = json!({"p1": {"v": "1"}, "p2": {"v": "2"}});
        let transport = respond(200, &body.to_string());

        let discovered = Discoverer::new(&transport).discover(&kind).await.unwrap();
        let document = discovered.document.unwrap();
        assert_eq!(document["p1"], json!({"v": "1"}));
        assert_eq!(discovered.records["p1"].content["v"], json!(1));
    }
}
