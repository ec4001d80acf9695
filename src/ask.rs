use crate::api::{AskResponse, RequestFailure};
use crate::lifecycle::{RequestId, RequestSequence};

pub const ASK_FALLBACK_MESSAGE: &str = "Request failed. Upload a document first.";

/// Display tier for a confidence score. Purely presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn classify(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 0.8 => ConfidenceTier::High,
            Some(s) if s >= 0.5 => ConfidenceTier::Medium,
            _ => ConfidenceTier::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

/// Formats a score in [0, 1] as a rounded percentage, e.g. `0.92` -> `92%`.
pub fn format_confidence(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub excerpts: Vec<String>,
    pub confidence: Option<f64>,
}

impl Answer {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::classify(self.confidence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskPhase {
    Idle,
    Loading,
    Answered(Answer),
    Error { message: String },
}

/// Owns the question card: the typed question, the request lifecycle, and
/// the answer display.
#[derive(Debug)]
pub struct AskController {
    question: String,
    phase: AskPhase,
    sources_expanded: bool,
    requests: RequestSequence,
}

impl Default for AskController {
    fn default() -> Self {
        Self::new()
    }
}

impl AskController {
    pub fn new() -> Self {
        Self {
            question: String::new(),
            phase: AskPhase::Idle,
            sources_expanded: false,
            requests: RequestSequence::new(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn phase(&self) -> &AskPhase {
        &self.phase
    }

    pub fn answer(&self) -> Option<&Answer> {
        match &self.phase {
            AskPhase::Answered(answer) => Some(answer),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            AskPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.requests.in_flight()
    }

    pub fn sources_expanded(&self) -> bool {
        self.sources_expanded
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        if !self.is_loading() {
            self.question = question.into();
        }
    }

    pub fn question_mut(&mut self) -> Option<&mut String> {
        if self.is_loading() {
            None
        } else {
            Some(&mut self.question)
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.question.trim().is_empty() && !self.is_loading()
    }

    /// Starts a request if allowed, returning its id and the trimmed question.
    pub fn submit(&mut self) -> Option<(RequestId, String)> {
        if !self.can_submit() {
            return None;
        }
        let question = self.question.trim().to_string();
        self.phase = AskPhase::Loading;
        self.sources_expanded = false;
        let id = self.requests.begin();
        tracing::info!("Asking: {}", question);
        Some((id, question))
    }

    pub fn complete(&mut self, id: RequestId, result: Result<AskResponse, RequestFailure>) -> bool {
        if !self.requests.finish(id) {
            tracing::debug!("Discarding stale ask completion {:?}", id);
            return false;
        }
        match result {
            Ok(resp) => {
                let excerpts = resp.excerpts().to_vec();
                tracing::info!(
                    "Answer received: {} excerpts, confidence {:?}",
                    excerpts.len(),
                    resp.confidence_score
                );
                self.sources_expanded = !excerpts.is_empty();
                self.phase = AskPhase::Answered(Answer {
                    text: resp.answer,
                    excerpts,
                    confidence: resp.confidence_score,
                });
            }
            Err(e) => {
                tracing::warn!("Ask failed: {}", e);
                self.phase = AskPhase::Error {
                    message: e.message().unwrap_or_else(|| ASK_FALLBACK_MESSAGE.to_string()),
                };
            }
        }
        true
    }

    pub fn toggle_sources(&mut self) {
        if self.answer().is_some_and(|a| !a.excerpts.is_empty()) {
            self.sources_expanded = !self.sources_expanded;
        }
    }
}
