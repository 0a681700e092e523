//! Test doubles shared by unit tests across modules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use rmcp::model::ProgressToken;

use crate::db::{Database, SqliteDatabase};
use crate::events::{ChangeListener, ListenerError};
use crate::mcp::capabilities::CapabilityKind;
use crate::mcp::client::{
    ChannelError, ChannelResult, ClientChannel, ElicitationRequest, ElicitationResponse,
    SamplingRequest,
};

/// Fresh migrated in-memory database.
pub async fn setup_db() -> Arc<SqliteDatabase> {
    let db = SqliteDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Migration should succeed");
    Arc::new(db)
}

/// Migrated database in a temporary file, with a real connection pool.
///
/// Keep the returned directory alive for as long as the database is used.
pub async fn setup_file_db() -> (tempfile::TempDir, Arc<SqliteDatabase>) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db = SqliteDatabase::open(dir.path().join("journal.db"))
        .await
        .expect("Failed to open database file");
    db.migrate().await.expect("Migration should succeed");
    (dir, Arc::new(db))
}

/// Collects every event published on a bus.
pub struct RecordingListener<E> {
    pub events: Mutex<Vec<E>>,
}

impl<E> RecordingListener<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }
}

impl<E: Clone> RecordingListener<E> {
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl<E: Clone + Send + Sync> ChangeListener<E> for RecordingListener<E> {
    fn on_change<'a>(&'a self, event: &'a E) -> BoxFuture<'a, Result<(), ListenerError>> {
        Box::pin(async move {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        })
    }
}

/// Everything a [`RecordingChannel`] was asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    ListChanged(CapabilityKind),
    ResourceUpdated { uri: String, title: String },
    Progress { progress: f64, total: f64 },
}

/// Client that records notifications in the order they were sent.
///
/// It cannot sample or elicit; use `MockClientChannel` for those.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn list_changed_count(&self, kind: CapabilityKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == Sent::ListChanged(kind))
            .count()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ClientChannel for RecordingChannel {
    async fn list_changed(&self, kind: CapabilityKind) -> ChannelResult<()> {
        self.record(Sent::ListChanged(kind));
        Ok(())
    }

    async fn resource_updated(&self, uri: &str, title: &str) -> ChannelResult<()> {
        self.record(Sent::ResourceUpdated {
            uri: uri.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    async fn progress(
        &self,
        _token: ProgressToken,
        progress: f64,
        total: f64,
        _message: Option<String>,
    ) -> ChannelResult<()> {
        self.record(Sent::Progress { progress, total });
        Ok(())
    }

    async fn create_message(&self, _request: SamplingRequest) -> ChannelResult<String> {
        Err(ChannelError::Unsupported {
            capability: "sampling".to_string(),
        })
    }

    fn supports_elicitation(&self) -> bool {
        false
    }

    async fn elicit(&self, _request: ElicitationRequest) -> ChannelResult<ElicitationResponse> {
        Err(ChannelError::Unsupported {
            capability: "elicitation".to_string(),
        })
    }
}
