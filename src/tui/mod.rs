use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use crate::api::{ApiClient, AskResponse, RequestFailure, UploadReceipt};
use crate::ask::AskController;
use crate::extract::ExtractController;
use crate::lifecycle::RequestId;
use crate::shipment::ShipmentRecord;
use crate::storage::KeyValueStore;
use crate::theme::ThemeStore;
use crate::upload::{parse_dropped_paths, CandidateSource, FileCandidate, UploadAction, UploadController};

mod cards;

pub const THROBBER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Focus {
    Upload,
    Ask,
    Extract,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Upload => Focus::Ask,
            Focus::Ask => Focus::Extract,
            Focus::Extract => Focus::Upload,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Upload => Focus::Extract,
            Focus::Ask => Focus::Upload,
            Focus::Extract => Focus::Ask,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Upload { id: RequestId, file: FileCandidate },
    Ask { id: RequestId, question: String },
    Extract { id: RequestId },
}

enum ApiResult {
    Upload(RequestId, Result<UploadReceipt, RequestFailure>),
    Ask(RequestId, Result<AskResponse, RequestFailure>),
    Extract(RequestId, Result<ShipmentRecord, RequestFailure>),
}

pub struct TuiApp<S: KeyValueStore> {
    pub focus: Focus,
    pub backend_label: String,

    // Upload card
    pub upload: UploadController,
    pub path_input: String,
    pub path_cursor: usize,

    // Ask card
    pub ask: AskController,
    pub ask_cursor: usize,

    // Extract card
    pub extract: ExtractController,

    // Global
    pub theme: ThemeStore<S>,
    pub throbber_frame: usize,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,
}

impl<S: KeyValueStore> TuiApp<S> {
    pub fn new(theme: ThemeStore<S>, backend_label: impl Into<String>) -> Self {
        Self {
            focus: Focus::Upload,
            backend_label: backend_label.into(),
            upload: UploadController::new(),
            path_input: String::new(),
            path_cursor: 0,
            ask: AskController::new(),
            ask_cursor: 0,
            extract: ExtractController::new(),
            theme,
            throbber_frame: 0,
            should_quit: false,
            status_message: None,
            status_message_time: None,
        }
    }

    pub fn advance_throbber(&mut self) {
        self.throbber_frame = (self.throbber_frame + 1) % THROBBER_FRAMES.len();
    }

    pub fn throbber(&self) -> char {
        THROBBER_FRAMES[self.throbber_frame]
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn is_busy(&self) -> bool {
        self.upload.is_uploading() || self.ask.is_loading() || self.extract.is_loading()
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.upload.tick(now);
        if self.is_busy() {
            self.advance_throbber();
        }
        if let Some(time) = self.status_message_time {
            if now.duration_since(time) >= Duration::from_secs(3) {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Dispatch> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                return None;
            }
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return None;
            }
            KeyCode::Char('t') if ctrl => {
                let theme = self.theme.toggle();
                self.set_status(format!(" Theme: {} ", theme));
                return None;
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return None;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Upload => self.handle_upload_key(key),
            Focus::Ask => self.handle_ask_key(key),
            Focus::Extract => self.handle_extract_key(key),
        }
    }

    /// Bracketed paste. On the upload card a paste is a file drop; on the ask
    /// card it is typed text.
    pub fn handle_paste(&mut self, text: &str) -> Option<Dispatch> {
        match self.focus {
            Focus::Upload => {
                let candidates = parse_dropped_paths(text);
                self.offer_files(CandidateSource::Drop, candidates)
            }
            Focus::Ask => {
                if let Some(question) = self.ask.question_mut() {
                    let flat = text.replace(['\r', '\n'], " ");
                    question.insert_str(self.ask_cursor, &flat);
                    self.ask_cursor += flat.len();
                }
                None
            }
            Focus::Extract => None,
        }
    }

    fn offer_files(&mut self, source: CandidateSource, candidates: Vec<FileCandidate>) -> Option<Dispatch> {
        match self.upload.offer(source, candidates) {
            UploadAction::Start { id, file } => {
                self.path_input.clear();
                self.path_cursor = 0;
                Some(Dispatch::Upload { id, file })
            }
            UploadAction::Rejected(_) | UploadAction::Ignored => None,
        }
    }

    fn handle_upload_key(&mut self, key: KeyEvent) -> Option<Dispatch> {
        if self.upload.is_uploading() {
            return None;
        }
        match key.code {
            KeyCode::Enter => {
                let path = self.path_input.trim();
                if path.is_empty() {
                    return None;
                }
                let candidate = FileCandidate::from_path(path);
                self.offer_files(CandidateSource::Picker, vec![candidate])
            }
            KeyCode::Char(_) if is_chord(&key) => None,
            code => {
                edit_input(&mut self.path_input, &mut self.path_cursor, code);
                None
            }
        }
    }

    fn handle_ask_key(&mut self, key: KeyEvent) -> Option<Dispatch> {
        match key.code {
            KeyCode::Enter => {
                let (id, question) = self.ask.submit()?;
                Some(Dispatch::Ask { id, question })
            }
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.ask.toggle_sources();
                None
            }
            KeyCode::Char(_) if is_chord(&key) => None,
            code => {
                if let Some(question) = self.ask.question_mut() {
                    edit_input(question, &mut self.ask_cursor, code);
                }
                None
            }
        }
    }

    fn handle_extract_key(&mut self, key: KeyEvent) -> Option<Dispatch> {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => {
                let id = self.extract.submit()?;
                Some(Dispatch::Extract { id })
            }
            _ => None,
        }
    }

    fn apply(&mut self, result: ApiResult) {
        match result {
            ApiResult::Upload(id, res) => {
                self.upload.complete(id, res, Instant::now());
            }
            ApiResult::Ask(id, res) => {
                self.ask.complete(id, res);
            }
            ApiResult::Extract(id, res) => {
                self.extract.complete(id, res);
            }
        }
    }
}

fn is_chord(key: &KeyEvent) -> bool {
    key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

/// Single-line editing shared by the path and question inputs. `cursor` is a
/// byte offset kept on a char boundary.
fn edit_input(input: &mut String, cursor: &mut usize, code: KeyCode) {
    match code {
        KeyCode::Char(c) => {
            input.insert(*cursor, c);
            *cursor += c.len_utf8();
        }
        KeyCode::Backspace => {
            if *cursor > 0 {
                if let Some(prev_char_idx) = input[..*cursor].char_indices().next_back().map(|(i, _)| i) {
                    input.remove(prev_char_idx);
                    *cursor = prev_char_idx;
                }
            }
        }
        KeyCode::Delete => {
            if *cursor < input.len() {
                input.remove(*cursor);
            }
        }
        KeyCode::Left => {
            if let Some((prev_idx, _)) = input[..*cursor].char_indices().next_back() {
                *cursor = prev_idx;
            }
        }
        KeyCode::Right => {
            if *cursor < input.len() {
                if let Some((next_idx, _)) = input[*cursor..].char_indices().nth(1) {
                    *cursor += next_idx;
                } else {
                    *cursor = input.len();
                }
            }
        }
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = input.len(),
        _ => {}
    }
}

pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_request(api: &ApiClient, dispatch: Dispatch, tx: &mpsc::Sender<ApiResult>) {
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = match dispatch {
            Dispatch::Upload { id, file } => ApiResult::Upload(id, api.upload(&file).await),
            Dispatch::Ask { id, question } => ApiResult::Ask(id, api.ask(&question).await),
            Dispatch::Extract { id } => ApiResult::Extract(id, api.extract().await),
        };
        let _ = tx.send(result).await;
    });
}

// ============================================================================
// MAIN APP LOOP
// ============================================================================

pub async fn run_app<S: KeyValueStore>(api: ApiClient, theme: ThemeStore<S>) -> anyhow::Result<()> {
    let mut app = TuiApp::new(theme, api.base_url().as_str());
    let mut terminal = setup_terminal()?;

    let tick_rate = Duration::from_millis(80);
    let mut last_tick = Instant::now();

    let (tx, mut rx) = mpsc::channel::<ApiResult>(16);

    let outcome: anyhow::Result<()> = async {
        loop {
            terminal.draw(|f| cards::draw(f, &app))?;

            while let Ok(result) = rx.try_recv() {
                app.apply(result);
            }

            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            if event::poll(timeout)? {
                let dispatch = match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                    Event::Paste(text) => app.handle_paste(&text),
                    _ => None,
                };
                if let Some(dispatch) = dispatch {
                    tracing::debug!("Dispatching {:?}", dispatch);
                    spawn_request(&api, dispatch, &tx);
                }
            }

            if last_tick.elapsed() >= tick_rate {
                app.on_tick(Instant::now());
                last_tick = Instant::now();
            }

            if app.should_quit {
                break;
            }
        }
        Ok(())
    }
    .await;

    restore_terminal(&mut terminal)?;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::theme::{SystemAppearance, ThemePreference};
    use crate::upload::UploadPhase;

    struct Light;
    impl SystemAppearance for Light {
        fn prefers_dark(&self) -> Option<bool> {
            Some(false)
        }
    }

    fn app() -> TuiApp<MemoryStore> {
        TuiApp::new(ThemeStore::init(MemoryStore::default(), &Light), "http://localhost:8000/")
    }

    fn press(app: &mut TuiApp<MemoryStore>, code: KeyCode) -> Option<Dispatch> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut TuiApp<MemoryStore>, c: char) -> Option<Dispatch> {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut TuiApp<MemoryStore>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn picker_and_drop_share_validation() {
        let mut app = app();
        type_text(&mut app, "/tmp/photo.png");
        assert_eq!(press(&mut app, KeyCode::Enter), None);
        assert!(app.upload.error_message().is_some());

        let dispatch = app.handle_paste("'/tmp/load tender.pdf' /tmp/other.txt");
        match dispatch {
            Some(Dispatch::Upload { file, .. }) => assert_eq!(file.name, "load tender.pdf"),
            other => panic!("expected upload dispatch, got {:?}", other),
        }
        assert_eq!(app.upload.phase(), &UploadPhase::Uploading);
        assert!(app.path_input.is_empty());
    }

    #[test]
    fn enter_in_ask_input_submits() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Ask);

        assert_eq!(press(&mut app, KeyCode::Enter), None);
        type_text(&mut app, "What is the rate?");
        match press(&mut app, KeyCode::Enter) {
            Some(Dispatch::Ask { question, .. }) => assert_eq!(question, "What is the rate?"),
            other => panic!("expected ask dispatch, got {:?}", other),
        }
        // input is frozen while loading
        type_text(&mut app, "xyz");
        assert_eq!(app.ask.question(), "What is the rate?");
    }

    #[test]
    fn cards_stay_independent() {
        let mut app = app();
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focus, Focus::Extract);
        let Some(Dispatch::Extract { id }) = press(&mut app, KeyCode::Enter) else {
            panic!("expected extract dispatch");
        };
        app.apply(ApiResult::Extract(id, Err(RequestFailure::Transport("down".into()))));

        assert!(app.extract.error_message().is_some());
        assert_eq!(app.upload.phase(), &UploadPhase::Idle);
        assert!(app.ask.error_message().is_none());
    }

    #[test]
    fn ctrl_t_toggles_theme() {
        let mut app = app();
        ctrl(&mut app, 't');
        assert_eq!(app.theme.get(), ThemePreference::Dark);
        assert!(app.status_message.is_some());
        ctrl(&mut app, 't');
        assert_eq!(app.theme.get(), ThemePreference::Light);
    }

    #[test]
    fn tick_reverts_upload_success() {
        let mut app = app();
        let Some(Dispatch::Upload { id, .. }) = app.handle_paste("/tmp/bol.txt") else {
            panic!("expected upload dispatch");
        };
        app.apply(ApiResult::Upload(id, Ok(UploadReceipt::default())));
        assert_eq!(app.upload.phase(), &UploadPhase::Success);

        app.on_tick(Instant::now() + Duration::from_secs(5));
        assert_eq!(app.upload.phase(), &UploadPhase::Idle);
    }

    #[test]
    fn input_editing_respects_char_boundaries() {
        let mut input = String::new();
        let mut cursor = 0;
        for c in "añb".chars() {
            edit_input(&mut input, &mut cursor, KeyCode::Char(c));
        }
        edit_input(&mut input, &mut cursor, KeyCode::Left);
        edit_input(&mut input, &mut cursor, KeyCode::Backspace);
        assert_eq!(input, "ab");
        assert_eq!(cursor, 1);

        edit_input(&mut input, &mut cursor, KeyCode::End);
        edit_input(&mut input, &mut cursor, KeyCode::Char('c'));
        assert_eq!(input, "abc");
    }

    #[test]
    fn control_and_alt_chords_are_not_typed() {
        let mut app = app();
        type_text(&mut app, "bol");
        ctrl(&mut app, 'o');
        app.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        assert_eq!(app.path_input, "bol");

        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "rate");
        ctrl(&mut app, 'w');
        assert_eq!(app.ask.question(), "rate");

        app.handle_key(KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT));
        assert_eq!(app.ask.question(), "rateR");
    }

    #[test]
    fn escape_quits() {
        let mut app = app();
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }
}
