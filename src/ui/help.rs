//! Help Overlay

use super::centered_rect;
use crate::app::App;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const RECENT_ACTIONS: usize = 5;

const SHORTCUTS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/k, ↑/↓", "Move up/down"),
            ("g/G", "Go to top/bottom"),
            ("1/2/3", "VM instances / databases / container services"),
            ("Tab", "Next section"),
        ],
    ),
    (
        "Actions",
        &[
            ("s", "Start selected resource"),
            ("x", "Stop selected resource"),
            ("R", "Refresh now"),
            ("a", "Toggle auto-refresh"),
        ],
    ),
    (
        "General",
        &[("?", "Toggle this help"), ("q, Ctrl+c", "Quit")],
    ),
];

pub fn render(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, popup_area);

    let key_style = Style::default().fg(Color::Yellow);
    let mut lines = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (section, keys) in SHORTCUTS {
        lines.push(Line::from(Span::styled(
            *section,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (key, description) in *keys {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<12}", key), key_style),
                Span::raw(*description),
            ]));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "Stopping a container service remembers its task count and start restores it.",
        Style::default().fg(Color::DarkGray),
    )));

    let accounts = app.accounts();
    if !accounts.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Accounts",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for account in &accounts {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<12}", account.name), key_style),
                Span::raw(format!("{} ({})", account.id, account.region)),
            ]));
        }
    }

    if !app.history.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Recent actions",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for record in app.history.records().take(RECENT_ACTIONS) {
            lines.push(Line::from(Span::raw(format!("  {}", record.history_line()))));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Help ");

    f.render_widget(Paragraph::new(lines).block(block), popup_area);
}
