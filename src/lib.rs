pub mod analytics;
pub mod background;
pub mod error;
pub mod model;
pub mod popup;
pub mod services;
pub mod storage;
pub mod utils;

use std::sync::Arc;

use tracing::level_filters::LevelFilter;

use crate::storage::memory::MemoryBackend;
use crate::storage::StorageBackend;

/// Per-process handle to the two independently-writable storage backends.
/// Constructed once by the hosting process and passed into every operation;
/// there are no ambient globals.
#[derive(Clone)]
pub struct ExtensionContext {
    pub sync: Arc<dyn StorageBackend>,
    pub local: Arc<dyn StorageBackend>,
}

impl ExtensionContext {
    pub fn new(sync: Arc<dyn StorageBackend>, local: Arc<dyn StorageBackend>) -> Self {
        Self { sync, local }
    }

    /// Context over two throwaway in-memory backends.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), Arc::new(MemoryBackend::new()))
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .compact()
        .init();
}
