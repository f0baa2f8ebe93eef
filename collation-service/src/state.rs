use collation_client::Collator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type SharedState = Arc<AppState>;

#[derive(Default)]
pub struct ServiceMetrics {
    pub collations: AtomicU64,
    pub data_errors: AtomicU64,
    pub environment_errors: AtomicU64,
    pub total_collate_ms: AtomicU64,
}

impl ServiceMetrics {
    pub fn record_success(&self, duration_ms: u64) {
        self.collations.fetch_add(1, Ordering::Relaxed);
        self.total_collate_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self, is_data_error: bool) {
        if is_data_error {
            self.data_errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.environment_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct AppState {
    pub collator: Collator,
    pub metrics: ServiceMetrics,
    pub started: Instant,
}

impl AppState {
    pub fn new(collator: Collator) -> Self {
        Self {
            collator,
            metrics: ServiceMetrics::default(),
            started: Instant::now(),
        }
    }
}
