//! Header Component
//!
//! Displays account count, active section and auto-refresh state.

use crate::app::App;
use crate::resource::model::ResourceKind;
use crate::VERSION;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" cost-saver v{} ", VERSION),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    // Row 1: accounts and auto-refresh
    let scheduler = app.scheduler();
    let refresh = if scheduler.is_refreshing() {
        Span::styled("refreshing...", Style::default().fg(Color::Yellow))
    } else if scheduler.is_active() {
        Span::styled(
            format!(
                "in {}s ({})",
                app.countdown_seconds(),
                scheduler.policy().reason
            ),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled("off", Style::default().fg(Color::DarkGray))
    };

    let status = Line::from(vec![
        Span::styled(" Accounts: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.account_count().to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Auto-refresh: ", Style::default().fg(Color::DarkGray)),
        refresh,
        if app.readonly {
            Span::styled(
                "  [READ-ONLY]",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::raw("")
        },
    ]);
    f.render_widget(Paragraph::new(status), rows[0]);

    // Row 2: section tabs
    let mut tabs = vec![Span::styled(" Section: ", Style::default().fg(Color::DarkGray))];
    for (i, kind) in ResourceKind::ALL.iter().enumerate() {
        let style = if *kind == app.section {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tabs.push(Span::styled(format!(" {}:{} ", i + 1, kind.display_name()), style));
        tabs.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(tabs)), rows[1]);

    // Row 3: key hints
    let hints = Line::from(Span::styled(
        " s:start  x:stop  R:refresh  a:auto-refresh  Tab:section  ?:help  q:quit",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(hints), rows[2]);
}
