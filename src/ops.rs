use std::fmt::Write;
use std::path::Path;
use std::time::Instant;

use crate::api::ApiClient;
use crate::ask::{format_confidence, Answer, AskController};
use crate::extract::ExtractController;
use crate::shipment::ShipmentRow;
use crate::storage::KeyValueStore;
use crate::theme::{ThemePreference, ThemeStore};
use crate::upload::{CandidateSource, FileCandidate, UploadAction, UploadController, UploadPhase};

pub async fn upload_once(
    api: &ApiClient,
    controller: &mut UploadController,
    source: CandidateSource,
    candidates: Vec<FileCandidate>,
) {
    if let UploadAction::Start { id, file } = controller.offer(source, candidates) {
        let result = api.upload(&file).await;
        controller.complete(id, result, Instant::now());
    }
}

pub async fn ask_once(api: &ApiClient, controller: &mut AskController) {
    if let Some((id, question)) = controller.submit() {
        let result = api.ask(&question).await;
        controller.complete(id, result);
    }
}

pub async fn extract_once(api: &ApiClient, controller: &mut ExtractController) {
    if let Some(id) = controller.submit() {
        let result = api.extract().await;
        controller.complete(id, result);
    }
}

pub async fn run_upload(api: &ApiClient, path: &Path) -> anyhow::Result<()> {
    let mut controller = UploadController::new();
    let candidate = FileCandidate::from_path(path);
    let name = candidate.name.clone();
    upload_once(api, &mut controller, CandidateSource::Picker, vec![candidate]).await;

    match controller.phase() {
        UploadPhase::Success => {
            println!("✓ Uploaded {}", name);
            Ok(())
        }
        UploadPhase::Error { message } => anyhow::bail!("{}", message),
        other => anyhow::bail!("Upload did not finish (state: {:?})", other),
    }
}

pub async fn run_ask(api: &ApiClient, question: &str) -> anyhow::Result<()> {
    let mut controller = AskController::new();
    controller.set_question(question);
    if !controller.can_submit() {
        anyhow::bail!("Question must not be empty");
    }
    ask_once(api, &mut controller).await;

    if let Some(message) = controller.error_message() {
        anyhow::bail!("{}", message);
    }
    if let Some(answer) = controller.answer() {
        print!("{}", render_answer(answer));
    }
    Ok(())
}

pub async fn run_extract(api: &ApiClient, as_json: bool) -> anyhow::Result<()> {
    let mut controller = ExtractController::new();
    extract_once(api, &mut controller).await;

    if let Some(message) = controller.error_message() {
        anyhow::bail!("{}", message);
    }
    if as_json {
        if let Some(record) = controller.record() {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
    } else if let Some(rows) = controller.rows() {
        print!("{}", render_rows(&rows));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    Show,
    Toggle,
    Set(ThemePreference),
}

pub fn run_theme<S: KeyValueStore>(store: &mut ThemeStore<S>, action: ThemeAction) -> ThemePreference {
    match action {
        ThemeAction::Show => {}
        ThemeAction::Toggle => {
            store.toggle();
        }
        ThemeAction::Set(theme) => store.set(theme),
    }
    store.get()
}

pub fn render_answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.text);
    if let Some(score) = answer.confidence {
        let _ = writeln!(out, "\nConfidence: {} ({})", format_confidence(score), answer.tier().label());
    }
    if !answer.excerpts.is_empty() {
        let _ = writeln!(out, "\nSupporting source text ({}):", answer.excerpts.len());
        for excerpt in &answer.excerpts {
            let _ = writeln!(out, "  • {}", excerpt.trim());
        }
    }
    out
}

pub fn render_rows(rows: &[ShipmentRow]) -> String {
    let width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {}", "Field", "Value", width = width);
    for row in rows {
        let _ = writeln!(out, "{:<width$}  {}", row.label, row.value, width = width);
    }
    out
}
