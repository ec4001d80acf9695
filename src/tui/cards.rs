use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::{Focus, TuiApp};
use crate::ask::{format_confidence, AskPhase, ConfidenceTier};
use crate::extract::ExtractPhase;
use crate::storage::KeyValueStore;
use crate::theme::{Palette, ThemePreference};
use crate::upload::UploadPhase;

const QUESTION_PLACEHOLDER: &str = "e.g. What is the delivery date?";

pub fn draw<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>) {
    let palette = *app.theme.palette();
    let size = frame.area();

    let root = Block::default().style(Style::default().bg(palette.background).fg(palette.foreground));
    frame.render_widget(root, size);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(8),
            Constraint::Length(17),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, app, &palette, layout[0]);
    draw_upload(frame, app, &palette, layout[1]);
    draw_ask(frame, app, &palette, layout[2]);
    draw_extract(frame, app, &palette, layout[3]);
    draw_footer(frame, app, &palette, layout[4]);
}

fn card_block<'a, S: KeyValueStore>(app: &TuiApp<S>, palette: &Palette, focus: Focus, title: &'a str) -> Block<'a> {
    let focused = app.focus == focus;
    let border = if focused { palette.accent } else { palette.border };
    let mut title_style = Style::default().fg(palette.foreground);
    if focused {
        title_style = title_style.add_modifier(Modifier::BOLD);
    }
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(format!(" {} ", title), title_style))
}

fn cursor_x(area: Rect, prefix: &str, typed: &str) -> u16 {
    let width = |s: &str| u16::try_from(s.chars().count()).unwrap_or(u16::MAX);
    area.x
        .saturating_add(width(prefix))
        .saturating_add(width(typed))
        .min(area.right().saturating_sub(1))
}

fn error_line(message: &str, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(format!(" ✗ {}", message), Style::default().fg(palette.error)))
}

fn draw_header<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>, palette: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(" Logistics Document AI ", Style::default().fg(palette.foreground).add_modifier(Modifier::BOLD)),
        Span::styled(format!("│ {}", app.backend_label), Style::default().fg(palette.muted)),
    ]));
    frame.render_widget(title, halves[0]);

    let (icon, hint) = match app.theme.get() {
        ThemePreference::Light => ("☀ light", "Ctrl+T dark mode "),
        ThemePreference::Dark => ("☾ dark", "Ctrl+T light mode "),
    };
    let theme = Paragraph::new(Line::from(vec![
        Span::styled(format!("{}  ", icon), Style::default().fg(palette.accent)),
        Span::styled(hint, Style::default().fg(palette.muted)),
    ]))
    .alignment(Alignment::Right);
    frame.render_widget(theme, halves[1]);
}

fn draw_upload<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>, palette: &Palette, area: Rect) {
    let block = card_block(app, palette, Focus::Upload, "Upload Document");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    match app.upload.phase() {
        UploadPhase::Uploading => {
            lines.push(Line::from(Span::styled(
                format!(" {} Uploading {}…", app.throbber(), app.upload.current_file().unwrap_or("file")),
                Style::default().fg(palette.warning),
            )));
        }
        UploadPhase::Success => {
            lines.push(Line::from(Span::styled(
                " ✓ Upload successful",
                Style::default().fg(palette.success).add_modifier(Modifier::BOLD),
            )));
        }
        UploadPhase::Idle | UploadPhase::Error { .. } => {
            lines.push(Line::from(Span::styled(
                " Drop a PDF, DOCX, or TXT file here, or type its path and press Enter",
                Style::default().fg(palette.muted),
            )));
            lines.push(Line::from(vec![
                Span::styled(" Path: ", Style::default().fg(palette.muted)),
                Span::styled(app.path_input.clone(), Style::default().fg(palette.foreground)),
            ]));
        }
    }
    if let Some(message) = app.upload.error_message() {
        lines.push(Line::from(""));
        lines.push(error_line(message, palette));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    if app.focus == Focus::Upload && !app.upload.is_uploading() && app.upload.phase() != &UploadPhase::Success {
        let x = cursor_x(inner, " Path: ", &app.path_input[..app.path_cursor]);
        frame.set_cursor_position((x, inner.y + 1));
    }
}

fn draw_ask<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>, palette: &Palette, area: Rect) {
    let block = card_block(app, palette, Focus::Ask, "Ask a Question");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let question = app.ask.question();
    let input = if question.is_empty() {
        Span::styled(QUESTION_PLACEHOLDER, Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC))
    } else {
        Span::styled(question.to_string(), Style::default().fg(palette.foreground))
    };
    let button_style = if app.ask.can_submit() {
        Style::default().fg(palette.background).bg(palette.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.muted)
    };
    let button = if app.ask.is_loading() {
        format!(" {} Asking ", app.throbber())
    } else {
        " Ask ⏎ ".to_string()
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" Question: ", Style::default().fg(palette.muted)),
            input,
            Span::raw("  "),
            Span::styled(button, button_style),
        ])),
        rows[0],
    );

    let mut lines: Vec<Line> = Vec::new();
    match app.ask.phase() {
        AskPhase::Idle | AskPhase::Loading => {}
        AskPhase::Error { message } => lines.push(error_line(message, palette)),
        AskPhase::Answered(answer) => {
            for text_line in answer.text.lines() {
                lines.push(Line::from(Span::styled(format!(" {}", text_line), Style::default().fg(palette.foreground))));
            }
            if let Some(score) = answer.confidence {
                let tier_color = match answer.tier() {
                    ConfidenceTier::High => palette.success,
                    ConfidenceTier::Medium => palette.warning,
                    ConfidenceTier::Low => palette.muted,
                };
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(" Confidence ", Style::default().fg(palette.muted)),
                    Span::styled(
                        format!(" {} ", format_confidence(score)),
                        Style::default().fg(palette.background).bg(tier_color).add_modifier(Modifier::BOLD),
                    ),
                ]));
            }
            if !answer.excerpts.is_empty() {
                let expanded = app.ask.sources_expanded();
                let icon = if expanded { "▼" } else { "▶" };
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(
                        format!(" {} Supporting source text ({})", icon, answer.excerpts.len()),
                        Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled("  Ctrl+O", Style::default().fg(palette.muted)),
                ]));
                if expanded {
                    let width = rows[2].width.saturating_sub(6).max(10) as usize;
                    for excerpt in &answer.excerpts {
                        for (i, wrapped) in textwrap::wrap(excerpt.trim(), width).into_iter().enumerate() {
                            let bullet = if i == 0 { "   • " } else { "     " };
                            lines.push(Line::from(vec![
                                Span::styled(bullet, Style::default().fg(palette.muted)),
                                Span::styled(wrapped.into_owned(), Style::default().fg(palette.muted).bg(palette.highlight)),
                            ]));
                        }
                    }
                }
            }
        }
    }
    frame.render_widget(Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }), rows[2]);

    if app.focus == Focus::Ask && !app.ask.is_loading() {
        let x = cursor_x(rows[0], " Question: ", &question[..app.ask_cursor]);
        frame.set_cursor_position((x, rows[0].y));
    }
}

fn draw_extract<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>, palette: &Palette, area: Rect) {
    let block = card_block(app, palette, Focus::Extract, "Extract Shipment");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(inner);

    let button = if app.extract.is_loading() {
        Span::styled(format!(" {} Extracting… ", app.throbber()), Style::default().fg(palette.warning))
    } else {
        Span::styled(
            " Extract ⏎ ",
            Style::default().fg(palette.background).bg(palette.accent).add_modifier(Modifier::BOLD),
        )
    };
    frame.render_widget(Paragraph::new(Line::from(vec![Span::raw(" "), button])), rows[0]);

    match app.extract.phase() {
        ExtractPhase::Idle | ExtractPhase::Loading => {}
        ExtractPhase::Error { message } => {
            frame.render_widget(Paragraph::new(error_line(message, palette)), rows[1]);
        }
        ExtractPhase::Done(_) => {
            let table_rows: Vec<Row> = app
                .extract
                .rows()
                .unwrap_or_default()
                .into_iter()
                .map(|row| {
                    let value_style = if row.is_missing() {
                        Style::default().fg(palette.muted)
                    } else {
                        Style::default().fg(palette.foreground)
                    };
                    Row::new(vec![
                        Cell::from(row.label).style(Style::default().fg(palette.muted)),
                        Cell::from(row.value).style(value_style),
                    ])
                })
                .collect();
            let header = Row::new(vec!["Field", "Value"])
                .style(Style::default().fg(palette.foreground).add_modifier(Modifier::BOLD));
            let table = Table::new(table_rows, [Constraint::Length(20), Constraint::Min(10)])
                .header(header)
                .column_spacing(2);
            frame.render_widget(table, rows[1]);
        }
    }
}

fn draw_footer<S: KeyValueStore>(frame: &mut Frame, app: &TuiApp<S>, palette: &Palette, area: Rect) {
    let text = app
        .status_message
        .clone()
        .unwrap_or_else(|| "Tab Next card │ Enter Submit │ Ctrl+T Theme │ Esc Quit".to_string());
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(palette.muted)).alignment(Alignment::Center),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AskResponse;
    use crate::shipment::ShipmentRecord;
    use crate::storage::MemoryStore;
    use crate::theme::{SystemAppearance, ThemeStore};
    use ratatui::{backend::TestBackend, Terminal};

    struct Dark;
    impl SystemAppearance for Dark {
        fn prefers_dark(&self) -> Option<bool> {
            Some(true)
        }
    }

    fn render(app: &TuiApp<MemoryStore>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_answer_badge_and_excerpts() {
        let mut app = TuiApp::new(ThemeStore::init(MemoryStore::default(), &Dark), "http://localhost:8000/");
        app.ask.set_question("What is the delivery date?");
        let (id, _) = app.ask.submit().unwrap();
        app.ask.complete(
            id,
            Ok(AskResponse {
                answer: "May 3".into(),
                supporting_source_text: Some(vec!["Delivery: May 3".into()]),
                confidence_score: Some(0.92),
            }),
        );

        let screen = render(&app);
        assert!(screen.contains("Logistics Document AI"));
        assert!(screen.contains("☾ dark"));
        assert!(screen.contains("May 3"));
        assert!(screen.contains("92%"));
        assert!(screen.contains("Supporting source text (1)"));
        assert!(screen.contains("• Delivery: May 3"));
    }

    #[test]
    fn renders_placeholder_for_missing_fields() {
        let mut app = TuiApp::new(ThemeStore::init(MemoryStore::default(), &Dark), "http://localhost:8000/");
        let id = app.extract.submit().unwrap();
        app.extract.complete(
            id,
            Ok(ShipmentRecord {
                rate: Some(0.0),
                ..Default::default()
            }),
        );

        let screen = render(&app);
        let rate_line = screen.lines().find(|l| l.contains("Rate")).unwrap();
        assert!(rate_line.contains('0'));
        let carrier_line = screen.lines().find(|l| l.contains("Carrier name")).unwrap();
        assert!(carrier_line.contains('—'));
    }

    #[test]
    fn long_pasted_question_keeps_cursor_on_screen() {
        let mut app = TuiApp::new(ThemeStore::init(MemoryStore::default(), &Dark), "http://localhost:8000/");
        app.focus = Focus::Ask;
        app.handle_paste(&"a".repeat(65530));
        assert_eq!(app.ask.question().len(), 65530);

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let cursor = terminal.get_cursor_position().unwrap();
        assert!(cursor.x < 100);
    }
}
