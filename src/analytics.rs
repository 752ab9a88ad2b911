use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::SCHEMA_VERSION;
use crate::storage::{self, StorageError};
use crate::ExtensionContext;

pub const MAX_BATCH_SIZE: usize = 10;
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

const CLIENT_ID_KEY: &str = "analyticsClientId";

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: String,
    pub params: Value,
}

/// Where flushed batches go. Dispatch transport lives with the host; the
/// core only queues.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn dispatch(&self, client_id: &str, events: Vec<AnalyticsEvent>);
}

/// Sink that logs batches instead of shipping them anywhere.
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn dispatch(&self, client_id: &str, events: Vec<AnalyticsEvent>) {
        debug!("dropping {} analytics events for client {client_id}", events.len());
    }
}

/// Fire-and-forget event queue. Events accumulate until the batch cap and
/// are never allowed to break extension functionality: a disabled handle
/// swallows everything.
pub struct Analytics {
    sink: Arc<dyn AnalyticsSink>,
    client_id: String,
    enabled: bool,
    queue: Mutex<Vec<AnalyticsEvent>>,
}

impl Analytics {
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            client_id: String::new(),
            enabled: false,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// `opted_out` mirrors the browser's Do Not Track signal. The client id
    /// persists in the local backend across sessions; if it cannot be read or
    /// written, analytics stays off for this process.
    pub async fn initialize(
        ctx: &ExtensionContext,
        sink: Arc<dyn AnalyticsSink>,
        opted_out: bool,
    ) -> Self {
        if opted_out {
            return Self::disabled();
        }
        let client_id = match load_or_create_client_id(ctx).await {
            Ok(client_id) => client_id,
            Err(err) => {
                warn!("analytics disabled, client id unavailable: {err}");
                return Self::disabled();
            }
        };
        Self {
            sink,
            client_id,
            enabled: true,
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn track(&self, name: &str, mut params: Value) {
        if !self.enabled {
            return;
        }
        if let Value::Object(map) = &mut params {
            map.insert("version".to_string(), json!(SCHEMA_VERSION));
        }

        let mut queue = self.queue.lock().await;
        queue.push(AnalyticsEvent {
            name: name.to_string(),
            params,
        });
        if queue.len() >= MAX_BATCH_SIZE {
            let batch = std::mem::take(&mut *queue);
            drop(queue);
            self.sink.dispatch(&self.client_id, batch).await;
        }
    }

    pub async fn flush(&self) {
        if !self.enabled {
            return;
        }
        let batch = std::mem::take(&mut *self.queue.lock().await);
        if batch.is_empty() {
            return;
        }
        self.sink.dispatch(&self.client_id, batch).await;
    }

    /// Periodic flush so sparse sessions still drain their queue. The caller
    /// owns the handle and aborts it on shutdown.
    pub fn spawn_flush_timer(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let analytics = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                analytics.flush().await;
            }
        })
    }

    #[cfg(test)]
    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }
}

async fn load_or_create_client_id(ctx: &ExtensionContext) -> Result<String, StorageError> {
    let stored = storage::read_key(ctx.local.as_ref(), CLIENT_ID_KEY)
        .await?
        .and_then(|value| value.as_str().map(str::to_string));
    if let Some(client_id) = stored {
        return Ok(client_id);
    }

    let client_id = Uuid::new_v4().to_string();
    storage::write_key(
        ctx.local.as_ref(),
        CLIENT_ID_KEY,
        Value::String(client_id.clone()),
    )
    .await?;
    Ok(client_id)
}
