//! Dialog Components
//!
//! Start/stop confirmation and warning dialogs.

use super::centered_rect;
use crate::app::{App, Mode};
use crate::notification::ActionType;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &App) {
    match app.mode {
        Mode::Confirm => render_confirm_dialog(f, app),
        Mode::Warning => render_warning_dialog(f, app),
        _ => {},
    }
}

fn render_confirm_dialog(f: &mut Frame, app: &App) {
    let Some(pending) = &app.pending_action else {
        return;
    };

    let popup_area = centered_rect(50, 25, f.area());
    f.render_widget(Clear, popup_area);

    // Stopping takes capacity away, so it gets the alarming colour
    let stopping = pending.action == ActionType::Stop;
    let accent = if stopping { Color::Red } else { Color::Green };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title(Span::styled(
            format!(" Confirm {} ", pending.action.display_name()),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(inner);

    let message = Paragraph::new(Line::from(Span::styled(
        &pending.message,
        Style::default().fg(Color::White),
    )))
    .alignment(Alignment::Center);
    f.render_widget(message, content_chunks[0]);

    let yes_style = if pending.selected_yes {
        Style::default()
            .fg(Color::Black)
            .bg(accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let no_style = if !pending.selected_yes {
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let buttons = Line::from(vec![
        Span::raw("  "),
        Span::styled(" Yes (y) ", yes_style),
        Span::raw("    "),
        Span::styled(" No (n) ", no_style),
        Span::raw("  "),
    ]);

    f.render_widget(
        Paragraph::new(buttons).alignment(Alignment::Center),
        content_chunks[2],
    );
}

fn render_warning_dialog(f: &mut Frame, app: &App) {
    let Some(message) = &app.warning_message else {
        return;
    };

    let popup_area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Warning ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(message.as_str(), Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    f.render_widget(Paragraph::new(content).alignment(Alignment::Center), inner);
}
