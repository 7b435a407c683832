//! Per-step progress reporting

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Started,
    Completed,
    Failed,
}

/// One step transition. `step_index` is 1-based within the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub version: String,
    pub step_index: usize,
    pub step_name: String,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        version: &semver::Version,
        step_index: usize,
        step_name: &str,
        status: ProgressStatus,
    ) -> Self {
        Self {
            version: version.to_string(),
            step_index,
            step_name: step_name.to_string(),
            status,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

pub trait ProgressObserver: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

/// Reports progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn notify(&self, event: &ProgressEvent) {
        match event.status {
            ProgressStatus::Started => tracing::info!(
                "[{}] step {} {} started",
                event.version,
                event.step_index,
                event.step_name
            ),
            ProgressStatus::Completed => tracing::info!(
                "[{}] step {} {} completed",
                event.version,
                event.step_index,
                event.step_name
            ),
            ProgressStatus::Failed => tracing::error!(
                "[{}] step {} {} failed: {}",
                event.version,
                event.step_index,
                event.step_name,
                event.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Writes one JSON object per line to stdout for an installer front end
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesProgress;

impl ProgressObserver for JsonLinesProgress {
    fn notify(&self, event: &ProgressEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{}", json).and_then(|_| out.flush()) {
                    tracing::warn!("Failed to write progress event: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize progress event: {}", e),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// `(step_index, step_name, status)` of every event, in arrival order
    pub fn transitions(&self) -> Vec<(usize, String, ProgressStatus)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.step_index, e.step_name.clone(), e.status))
            .collect()
    }
}

impl ProgressObserver for ProgressLog {
    fn notify(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_status_in_snake_case() {
        let event = ProgressEvent::new(
            &semver::Version::new(6, 0, 0),
            4,
            "m04_add_permissions",
            ProgressStatus::Completed,
        );
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["step_index"], 4);
        assert_eq!(json["version"], "6.0.0");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_progress_log_records_in_order() {
        let log = ProgressLog::new();
        let version = semver::Version::new(6, 0, 0);
        log.notify(&ProgressEvent::new(&version, 1, "a", ProgressStatus::Started));
        log.notify(&ProgressEvent::new(&version, 1, "a", ProgressStatus::Failed).with_error("boom"));

        assert_eq!(
            log.transitions(),
            vec![
                (1, "a".to_string(), ProgressStatus::Started),
                (1, "a".to_string(), ProgressStatus::Failed),
            ]
        );
        assert_eq!(log.events()[1].error.as_deref(), Some("boom"));
    }
}
