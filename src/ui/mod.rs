//! Terminal User Interface rendering module
//!
//! Draws the active section as a table with per-kind columns, coloured by
//! power state.
//!
//! - `header` - account count, section tabs, auto-refresh countdown
//! - `help` - keybindings and recent actions
//! - `dialog` - start/stop confirmation and warnings
//!
//! Only the visible rows are built; a scrollbar shows the position in long
//! snapshots.

mod dialog;
mod header;
mod help;

use crate::app::{App, Mode};
use crate::resource::model::{ManagedResource, PowerManaged, PowerState, ResourceKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState,
    },
    Frame,
};

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Min(1),    // Resource table
            Constraint::Length(1), // Footer/crumb
        ])
        .split(f.area());

    header::render(f, app, chunks[0]);
    render_table(f, app, chunks[1]);
    render_crumb(f, app, chunks[2]);

    // Overlays
    match app.mode {
        Mode::Help => help::render(f, app),
        Mode::Confirm | Mode::Warning => dialog::render(f, app),
        Mode::Normal => {},
    }
}

/// Column headers and widths (percent) per kind
fn columns(kind: ResourceKind) -> &'static [(&'static str, u16)] {
    match kind {
        ResourceKind::Compute => &[
            ("NAME", 26),
            ("ACCOUNT", 16),
            ("STATE", 16),
            ("TYPE", 14),
            ("PUBLIC IP", 14),
            ("PRIVATE IP", 14),
        ],
        ResourceKind::Database => &[
            ("IDENTIFIER", 26),
            ("ACCOUNT", 16),
            ("STATUS", 16),
            ("ENGINE", 14),
            ("CLASS", 14),
            ("ENDPOINT", 14),
        ],
        ResourceKind::Container => &[
            ("SERVICE", 26),
            ("CLUSTER", 16),
            ("ACCOUNT", 14),
            ("STATE", 16),
            ("TASKS D/R/P", 14),
            ("PREVIOUS", 14),
        ],
    }
}

/// Cell values in the same order as [`columns`]
fn row_values(item: &ManagedResource) -> Vec<String> {
    let dash = || "-".to_string();
    match item {
        ManagedResource::ComputeInstance(vm) => vec![
            vm.meta.display_name.clone(),
            vm.meta.account_name.clone(),
            vm.raw_state.clone(),
            vm.instance_type.clone(),
            vm.public_ip.clone().unwrap_or_else(dash),
            vm.private_ip.clone().unwrap_or_else(dash),
        ],
        ManagedResource::ManagedDatabase(db) => vec![
            db.meta.display_name.clone(),
            db.meta.account_name.clone(),
            db.raw_status.clone(),
            db.engine.clone(),
            db.instance_class.clone(),
            match (&db.endpoint, db.port) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.clone(),
                _ => dash(),
            },
        ],
        ManagedResource::ContainerService(svc) => vec![
            svc.meta.display_name.clone(),
            svc.cluster_name.clone(),
            svc.meta.account_name.clone(),
            svc.meta.power_state.to_string(),
            format!(
                "{}/{}/{}",
                svc.desired_count, svc.running_count, svc.pending_count
            ),
            svc.previous_desired_count
                .map(|n| n.to_string())
                .unwrap_or_else(dash),
        ],
    }
}

/// Index of the state column, which gets coloured
const STATE_COLUMN: usize = 2;

fn state_color(state: PowerState) -> Color {
    match state {
        PowerState::Running => Color::Green,
        PowerState::Stopped => Color::Red,
        PowerState::Transitioning => Color::Yellow,
        PowerState::Unknown => Color::DarkGray,
    }
}

fn state_column(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Container => STATE_COLUMN + 1,
        _ => STATE_COLUMN,
    }
}

/// Render the active snapshot with virtual scrolling
fn render_table(f: &mut Frame, app: &mut App, area: Rect) {
    let kind = app.section;
    let count = app.current_snapshot().len();

    let title = if app.is_refreshing() && count == 0 {
        format!(" {} [loading] ", kind.display_name())
    } else {
        format!(" {}[{}] ", kind.display_name(), count)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center);

    let inner_area = block.inner(area);
    f.render_widget(block, area);

    // Account for header row
    let visible_height = (inner_area.height as usize).saturating_sub(1);
    app.update_viewport(visible_height);
    app.ensure_visible();

    let needs_scrollbar = count > visible_height;
    let table_area = if needs_scrollbar {
        Rect {
            width: inner_area.width.saturating_sub(1),
            ..inner_area
        }
    } else {
        inner_area
    };

    let range = app.visible_range();
    let cols = columns(kind);
    let colored = state_column(kind);

    let header = Row::new(cols.iter().map(|(name, _)| {
        Cell::from(format!(" {}", name)).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .height(1);

    let rows: Vec<Row> = app.current_snapshot()[range.clone()]
        .iter()
        .map(|item| {
            let state = item.power_state();
            let cells = row_values(item).into_iter().enumerate().map(|(i, value)| {
                if i == colored {
                    let text = if state.is_transitional() {
                        format!("{} ↻", value)
                    } else {
                        value
                    };
                    Cell::from(format!(" {}", truncate_string(&text, 38)))
                        .style(Style::default().fg(state_color(state)))
                } else {
                    Cell::from(format!(" {}", truncate_string(&value, 38)))
                }
            });
            Row::new(cells)
        })
        .collect();

    let widths: Vec<Constraint> = cols
        .iter()
        .map(|(_, width)| Constraint::Percentage(*width))
        .collect();

    let table = Table::new(rows, widths).header(header).row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    if app.selected >= range.start && app.selected < range.end {
        state.select(Some(app.selected - range.start));
    }

    f.render_stateful_widget(table, table_area, &mut state);

    if needs_scrollbar {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .symbols(symbols::scrollbar::VERTICAL)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state =
            ScrollbarState::new(count.saturating_sub(visible_height)).position(app.scroll_offset);

        f.render_stateful_widget(scrollbar, inner_area, &mut scrollbar_state);
    }
}

/// Truncate string for display (Unicode-safe)
fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_len {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

fn render_crumb(f: &mut Frame, app: &App, area: Rect) {
    let status = app.status_line();

    let style = if app.error_message.is_some() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if app.refresh_warning.is_some() {
        Style::default().fg(Color::Yellow)
    } else if status.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let text = match status {
        Some(text) if app.error_message.is_some() => format!("Error: {}", text),
        Some(text) => text,
        None if app.is_refreshing() => "Refreshing...".to_string(),
        None => String::new(),
    };

    let crumb = Line::from(vec![
        Span::styled(
            format!("<{}>", app.section.key()),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(text, style),
    ]);

    f.render_widget(Paragraph::new(crumb), area);
}

/// Rect of the given percentage size centred in `r`
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string_unicode() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("ééééééééééé", 8), "ééééé...");
    }

    #[test]
    fn test_columns_match_row_width() {
        for kind in ResourceKind::ALL {
            let total: u16 = columns(kind).iter().map(|(_, w)| w).sum();
            assert_eq!(total, 100, "{} widths", kind);
            assert!(state_column(kind) < columns(kind).len());
        }
    }
}
