use crate::api::RequestFailure;
use crate::lifecycle::{RequestId, RequestSequence};
use crate::shipment::{ShipmentRecord, ShipmentRow};

pub const EXTRACT_FALLBACK_MESSAGE: &str = "Extract failed. Upload a document first.";

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractPhase {
    Idle,
    Loading,
    Done(ShipmentRecord),
    Error { message: String },
}

/// Owns the extraction card. Extraction takes no input: it always runs
/// against whatever the backend last received.
#[derive(Debug)]
pub struct ExtractController {
    phase: ExtractPhase,
    requests: RequestSequence,
}

impl Default for ExtractController {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractController {
    pub fn new() -> Self {
        Self {
            phase: ExtractPhase::Idle,
            requests: RequestSequence::new(),
        }
    }

    pub fn phase(&self) -> &ExtractPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.requests.in_flight()
    }

    pub fn record(&self) -> Option<&ShipmentRecord> {
        match &self.phase {
            ExtractPhase::Done(record) => Some(record),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            ExtractPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<Vec<ShipmentRow>> {
        self.record().map(ShipmentRecord::rows)
    }

    pub fn submit(&mut self) -> Option<RequestId> {
        if self.is_loading() {
            return None;
        }
        self.phase = ExtractPhase::Loading;
        tracing::info!("Requesting shipment extraction");
        Some(self.requests.begin())
    }

    pub fn complete(&mut self, id: RequestId, result: Result<ShipmentRecord, RequestFailure>) -> bool {
        if !self.requests.finish(id) {
            tracing::debug!("Discarding stale extract completion {:?}", id);
            return false;
        }
        self.phase = match result {
            Ok(record) => {
                tracing::info!("Extracted {} of 11 shipment fields", record.present_count());
                ExtractPhase::Done(record)
            }
            Err(e) => {
                tracing::warn!("Extract failed: {}", e);
                ExtractPhase::Error {
                    message: e.message().unwrap_or_else(|| EXTRACT_FALLBACK_MESSAGE.to_string()),
                }
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipment::MISSING_VALUE;

    #[test]
    fn network_error_sets_fallback_without_table() {
        let mut controller = ExtractController::new();
        let id = controller.submit().unwrap();
        assert_eq!(controller.phase(), &ExtractPhase::Loading);

        controller.complete(id, Err(RequestFailure::Transport("connection refused".into())));
        assert_eq!(controller.error_message(), Some(EXTRACT_FALLBACK_MESSAGE));
        assert_eq!(controller.rows(), None);
    }

    #[test]
    fn failed_retry_drops_previous_table() {
        let mut controller = ExtractController::new();
        let id = controller.submit().unwrap();
        controller.complete(
            id,
            Ok(ShipmentRecord {
                shipment_id: Some("LD-1".into()),
                ..Default::default()
            }),
        );
        assert!(controller.rows().is_some());

        let id = controller.submit().unwrap();
        assert_eq!(controller.rows(), None);
        controller.complete(id, Err(RequestFailure::Decode("bad json".into())));
        assert_eq!(controller.rows(), None);
        assert!(controller.error_message().unwrap().contains("bad json"));
    }

    #[test]
    fn fields_render_independently() {
        let mut controller = ExtractController::new();
        let id = controller.submit().unwrap();
        controller.complete(
            id,
            Ok(ShipmentRecord {
                shipment_id: Some("LD53657".into()),
                rate: Some(0.0),
                ..Default::default()
            }),
        );

        let rows = controller.rows().unwrap();
        assert_eq!(rows[0].value, "LD53657");
        assert_eq!(rows[1].value, MISSING_VALUE);
        assert_eq!(rows[7].label, "Rate");
        assert_eq!(rows[7].value, "0");
    }

    #[test]
    fn submit_is_ignored_while_loading() {
        let mut controller = ExtractController::new();
        let first = controller.submit().unwrap();
        assert_eq!(controller.submit(), None);
        assert!(controller.complete(first, Ok(ShipmentRecord::default())));
        assert!(controller.submit().is_some());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut controller = ExtractController::new();
        let first = controller.submit().unwrap();
        controller.complete(first, Err(RequestFailure::Transport("reset".into())));
        let _second = controller.submit().unwrap();

        assert!(!controller.complete(first, Ok(ShipmentRecord::default())));
        assert_eq!(controller.phase(), &ExtractPhase::Loading);
    }
}
