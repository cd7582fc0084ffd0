use std::sync::Arc;

use service::records::RecordService;

/// Shared handler state. The record service and the Google clients inside it
/// are built once at startup and reused by every request.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordService>,
}

impl AppState {
    pub fn new(records: RecordService) -> Self {
        Self { records: Arc::new(records) }
    }
}
