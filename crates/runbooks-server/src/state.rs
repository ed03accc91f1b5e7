use std::sync::Arc;
use std::time::Instant;

use runbooks_router::AdapterRegistry;

use crate::feedback::FeedbackLog;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AdapterRegistry>,
    pub feedback: FeedbackLog,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            feedback: FeedbackLog::new(),
            started_at: Instant::now(),
        }
    }
}
