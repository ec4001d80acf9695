use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

use crate::api::{RequestFailure, UploadReceipt};
use crate::lifecycle::{RequestId, RequestSequence};

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["application/pdf", DOCX_MIME, "text/plain"];

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// How long the success indicator stays up before the card resets.
pub const SUCCESS_DISPLAY: Duration = Duration::from_millis(4000);

pub const UPLOAD_FALLBACK_MESSAGE: &str = "Upload failed. Is the backend running?";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please upload a PDF, DOCX, or TXT file.")]
    UnsupportedType,
}

/// Where a candidate came from. Both sources share one validation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Drop,
    Picker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub name: String,
    pub mime: Option<String>,
}

impl FileCandidate {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let mime = mime_for_name(&name).map(str::to_string);
        Self { path, name, mime }
    }

    pub fn is_supported(&self) -> bool {
        let mime_ok = self
            .mime
            .as_deref()
            .is_some_and(|m| ACCEPTED_MIME_TYPES.contains(&m));
        mime_ok || has_accepted_extension(&self.name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedType)
        }
    }

    pub fn content_type(&self) -> &str {
        self.mime.as_deref().unwrap_or("application/octet-stream")
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn has_accepted_extension(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

fn mime_for_name(name: &str) -> Option<&'static str> {
    match extension_of(name)?.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => Some(DOCX_MIME),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Splits text pasted by a terminal file drop into candidates.
///
/// Terminals differ: some paste quoted paths, some escape spaces with a
/// backslash, some paste `file://` URLs, and multi-file drops arrive either
/// newline- or space-separated.
pub fn parse_dropped_paths(text: &str) -> Vec<FileCandidate> {
    text.lines()
        .flat_map(split_shell_words)
        .filter_map(|word| {
            if word.starts_with("file://") {
                Url::parse(&word).ok()?.to_file_path().ok()
            } else {
                Some(PathBuf::from(word))
            }
        })
        .map(FileCandidate::from_path)
        .collect()
}

fn split_shell_words(line: &str) -> Vec<String> {
    match shell_words::split(line.trim()) {
        Ok(words) => words,
        // unbalanced quote
        Err(_) => line.split_whitespace().map(str::to_string).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Success,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    Ignored,
    Rejected(ValidationError),
    /// Send `file` and report back with `id`.
    Start { id: RequestId, file: FileCandidate },
}

#[derive(Debug)]
pub struct UploadController {
    phase: UploadPhase,
    requests: RequestSequence,
    revert_at: Option<Instant>,
    current_file: Option<String>,
}

impl Default for UploadController {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadController {
    pub fn new() -> Self {
        Self {
            phase: UploadPhase::Idle,
            requests: RequestSequence::new(),
            revert_at: None,
            current_file: None,
        }
    }

    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            UploadPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.phase == UploadPhase::Uploading
    }

    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Single entry point for dropped and picked files. Only the first
    /// candidate is considered.
    pub fn offer(
        &mut self,
        source: CandidateSource,
        candidates: impl IntoIterator<Item = FileCandidate>,
    ) -> UploadAction {
        if self.is_uploading() {
            tracing::debug!("Ignoring {:?} offer while an upload is running", source);
            return UploadAction::Ignored;
        }
        let Some(file) = candidates.into_iter().next() else {
            return UploadAction::Ignored;
        };

        // Any new action supersedes a pending success revert.
        self.revert_at = None;

        if let Err(e) = file.validate() {
            tracing::info!("Rejected {} ({:?}): {}", file.name, file.mime, e);
            self.phase = UploadPhase::Error { message: e.to_string() };
            return UploadAction::Rejected(e);
        }

        tracing::info!("Uploading {} via {:?}", file.name, source);
        self.phase = UploadPhase::Uploading;
        self.current_file = Some(file.name.clone());
        let id = self.requests.begin();
        UploadAction::Start { id, file }
    }

    pub fn complete(
        &mut self,
        id: RequestId,
        result: Result<UploadReceipt, RequestFailure>,
        now: Instant,
    ) -> bool {
        if !self.requests.finish(id) {
            tracing::debug!("Discarding stale upload completion {:?}", id);
            return false;
        }
        match result {
            Ok(receipt) => {
                tracing::info!(
                    "Upload accepted: status={:?}, chunks={:?}",
                    receipt.status,
                    receipt.chunks
                );
                self.phase = UploadPhase::Success;
                self.revert_at = Some(now + SUCCESS_DISPLAY);
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                self.phase = UploadPhase::Error {
                    message: e.message().unwrap_or_else(|| UPLOAD_FALLBACK_MESSAGE.to_string()),
                };
            }
        }
        true
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.revert_at {
            if now >= deadline {
                self.revert_at = None;
                if self.phase == UploadPhase::Success {
                    self.phase = UploadPhase::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, mime: Option<&str>) -> FileCandidate {
        FileCandidate {
            path: PathBuf::from(name),
            name: name.to_string(),
            mime: mime.map(str::to_string),
        }
    }

    fn start(controller: &mut UploadController, file: FileCandidate) -> RequestId {
        match controller.offer(CandidateSource::Picker, [file]) {
            UploadAction::Start { id, .. } => id,
            other => panic!("expected upload to start, got {:?}", other),
        }
    }

    #[test]
    fn accepts_by_mime_or_extension() {
        assert!(candidate("invoice.pdf", Some("application/pdf")).is_supported());
        assert!(candidate("scan", Some("application/pdf")).is_supported());
        assert!(candidate("notes", Some("text/plain")).is_supported());
        assert!(candidate("RATECON.DOCX", None).is_supported());
        assert!(candidate("bol.Txt", Some("application/octet-stream")).is_supported());
    }

    #[test]
    fn rejects_other_types_without_request() {
        let mut controller = UploadController::new();
        for file in [
            candidate("photo.png", Some("image/png")),
            candidate("sheet.xlsx", None),
            candidate("archive.pdf.zip", None),
            candidate("pdf", None),
        ] {
            let action = controller.offer(CandidateSource::Drop, [file]);
            assert_eq!(action, UploadAction::Rejected(ValidationError::UnsupportedType));
            assert_eq!(
                controller.error_message(),
                Some("Please upload a PDF, DOCX, or TXT file.")
            );
        }
    }

    #[test]
    fn success_reverts_after_display_timeout() {
        let mut controller = UploadController::new();
        let id = start(&mut controller, candidate("invoice.pdf", Some("application/pdf")));
        assert_eq!(controller.phase(), &UploadPhase::Uploading);

        let t0 = Instant::now();
        assert!(controller.complete(id, Ok(UploadReceipt::default()), t0));
        assert_eq!(controller.phase(), &UploadPhase::Success);

        controller.tick(t0 + Duration::from_millis(3999));
        assert_eq!(controller.phase(), &UploadPhase::Success);

        controller.tick(t0 + SUCCESS_DISPLAY);
        assert_eq!(controller.phase(), &UploadPhase::Idle);
    }

    #[test]
    fn superseding_offer_cancels_revert() {
        let mut controller = UploadController::new();
        let id = start(&mut controller, candidate("a.pdf", None));
        let t0 = Instant::now();
        controller.complete(id, Ok(UploadReceipt::default()), t0);

        controller.offer(CandidateSource::Drop, [candidate("b.png", None)]);
        controller.tick(t0 + SUCCESS_DISPLAY * 2);
        assert!(controller.error_message().is_some());

        let id = start(&mut controller, candidate("c.txt", None));
        controller.tick(t0 + SUCCESS_DISPLAY * 2);
        assert!(controller.is_uploading());
        let t1 = t0 + SUCCESS_DISPLAY * 3;
        controller.complete(id, Ok(UploadReceipt::default()), t1);
        controller.tick(t1 + Duration::from_millis(1));
        assert_eq!(controller.phase(), &UploadPhase::Success);
    }

    #[test]
    fn failure_uses_message_or_fallback() {
        let mut controller = UploadController::new();
        let id = start(&mut controller, candidate("a.pdf", None));
        controller.complete(id, Err(RequestFailure::Transport("connection refused".into())), Instant::now());
        assert_eq!(controller.error_message(), Some(UPLOAD_FALLBACK_MESSAGE));

        let id = start(&mut controller, candidate("a.pdf", None));
        controller.complete(
            id,
            Err(RequestFailure::Status {
                status: 500,
                detail: Some("Document parsing failed".into()),
            }),
            Instant::now(),
        );
        assert_eq!(controller.error_message(), Some("Document parsing failed"));
    }

    #[test]
    fn only_first_candidate_is_considered() {
        let mut controller = UploadController::new();
        let action = controller.offer(
            CandidateSource::Drop,
            vec![candidate("notes.txt", None), candidate("photo.png", None)],
        );
        match action {
            UploadAction::Start { file, .. } => assert_eq!(file.name, "notes.txt"),
            other => panic!("unexpected {:?}", other),
        }

        let mut controller = UploadController::new();
        let action = controller.offer(
            CandidateSource::Drop,
            vec![candidate("photo.png", None), candidate("notes.txt", None)],
        );
        assert!(matches!(action, UploadAction::Rejected(_)));
    }

    #[test]
    fn offers_are_ignored_while_uploading_or_empty() {
        let mut controller = UploadController::new();
        assert_eq!(
            controller.offer(CandidateSource::Drop, Vec::new()),
            UploadAction::Ignored
        );
        assert_eq!(controller.phase(), &UploadPhase::Idle);

        start(&mut controller, candidate("a.pdf", None));
        assert_eq!(
            controller.offer(CandidateSource::Picker, [candidate("b.pdf", None)]),
            UploadAction::Ignored
        );
        assert_eq!(controller.current_file(), Some("a.pdf"));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut controller = UploadController::new();
        let first = start(&mut controller, candidate("a.pdf", None));
        controller.complete(first, Err(RequestFailure::Transport("reset".into())), Instant::now());
        let _second = start(&mut controller, candidate("b.pdf", None));

        assert!(!controller.complete(first, Ok(UploadReceipt::default()), Instant::now()));
        assert!(controller.is_uploading());
    }

    #[test]
    fn from_path_declares_type_from_extension() {
        let file = FileCandidate::from_path("/tmp/loads/Invoice.PDF");
        assert_eq!(file.name, "Invoice.PDF");
        assert_eq!(file.mime.as_deref(), Some("application/pdf"));

        let file = FileCandidate::from_path("/tmp/readme");
        assert_eq!(file.mime, None);
        assert_eq!(file.content_type(), "application/octet-stream");
    }

    #[test]
    fn parses_terminal_drops() {
        let names = |text: &str| -> Vec<PathBuf> {
            parse_dropped_paths(text).into_iter().map(|c| c.path).collect()
        };

        assert_eq!(names("/tmp/rate con.pdf"), vec![PathBuf::from("/tmp/rate"), PathBuf::from("con.pdf")]);
        assert_eq!(names("'/tmp/rate con.pdf'"), vec![PathBuf::from("/tmp/rate con.pdf")]);
        assert_eq!(names("/tmp/rate\\ con.pdf"), vec![PathBuf::from("/tmp/rate con.pdf")]);
        assert_eq!(names("\"/tmp/a.pdf\" /tmp/b.txt\n"), vec![PathBuf::from("/tmp/a.pdf"), PathBuf::from("/tmp/b.txt")]);
        assert!(names("   \n  ").is_empty());
        assert_eq!(names("'/tmp/open quote.pdf"), vec![PathBuf::from("'/tmp/open"), PathBuf::from("quote.pdf")]);
    }

    #[cfg(unix)]
    #[test]
    fn parses_file_urls() {
        let dropped = parse_dropped_paths("file:///home/dispatch/bill%20of%20lading.txt");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].path, PathBuf::from("/home/dispatch/bill of lading.txt"));
        assert_eq!(dropped[0].mime.as_deref(), Some("text/plain"));
    }
}
