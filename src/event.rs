//! Event Handling
//!
//! Keyboard handling for cost-saver.

use crate::app::{App, Mode};
use crate::notification::ActionType;
use crate::resource::model::ResourceKind;
use anyhow::Result;
use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use std::time::Duration;

/// Handle events, returns true if app should quit
pub async fn handle_events(app: &mut App) -> Result<bool> {
    if poll(Duration::from_millis(100))? {
        if let Event::Key(key) = read()? {
            return handle_key_event(app, key.code, key.modifiers).await;
        }
    }
    Ok(false)
}

async fn handle_key_event(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Result<bool> {
    // Global quit shortcut
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    match app.mode {
        Mode::Normal => Ok(handle_normal_mode(app, code)),
        Mode::Help => Ok(handle_help_mode(app, code)),
        Mode::Confirm => Ok(handle_confirm_mode(app, code).await),
        Mode::Warning => Ok(handle_warning_mode(app, code)),
    }
}

fn handle_normal_mode(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('q') => return true,

        // Navigation - vim style + accessible alternatives
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.previous(),
        KeyCode::Char('g') | KeyCode::Home => app.go_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.go_to_bottom(),

        // Sections
        KeyCode::Char('1') => app.switch_section(ResourceKind::Compute),
        KeyCode::Char('2') => app.switch_section(ResourceKind::Database),
        KeyCode::Char('3') => app.switch_section(ResourceKind::Container),
        KeyCode::Tab => app.next_section(),

        // Power actions
        KeyCode::Char('s') => request_action(app, ActionType::Start),
        KeyCode::Char('x') => request_action(app, ActionType::Stop),

        // Refresh
        KeyCode::Char('R') => {
            app.refresh_now();
        },
        KeyCode::Char('a') => {
            let active = app.scheduler().is_active();
            app.set_scheduler_active(!active);
        },

        KeyCode::Char('?') => app.enter_help_mode(),
        KeyCode::Esc => app.error_message = None,

        _ => {},
    }
    false
}

fn request_action(app: &mut App, action: ActionType) {
    if app.readonly {
        app.show_warning("Read-only mode: actions are disabled");
        return;
    }

    if let Some(pending) = app.create_pending_action(action) {
        app.enter_confirm_mode(pending);
    }
}

fn handle_help_mode(app: &mut App, code: KeyCode) -> bool {
    if matches!(
        code,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Enter
    ) {
        app.exit_mode();
    }
    false
}

async fn handle_confirm_mode(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            app.exit_mode();
        },
        KeyCode::Left | KeyCode::Char('h') => {
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = true;
            }
        },
        KeyCode::Right | KeyCode::Char('l') => {
            if let Some(ref mut pending) = app.pending_action {
                pending.selected_yes = false;
            }
        },
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.execute_pending().await;
        },
        KeyCode::Enter => {
            let confirmed = app
                .pending_action
                .as_ref()
                .is_some_and(|pending| pending.selected_yes);
            if confirmed {
                app.execute_pending().await;
            } else {
                app.exit_mode();
            }
        },
        _ => {},
    }
    false
}

fn handle_warning_mode(app: &mut App, code: KeyCode) -> bool {
    if matches!(code, KeyCode::Esc | KeyCode::Enter) {
        app.warning_message = None;
        app.exit_mode();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::demo_fleet;
    use crate::cloud::AccountRegistry;
    use crate::config::Config;
    use crate::resource::fleet::Fleet;
    use crate::resource::model::PowerManaged;
    use std::sync::Arc;

    fn app(readonly: bool) -> App {
        let (accounts, cloud) = demo_fleet();
        let fleet = Fleet::with_provider(AccountRegistry::new(accounts), Arc::new(cloud));
        App::new(Arc::new(fleet), Config::in_memory(), ResourceKind::Compute, readonly)
    }

    async fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key_event(app, code, KeyModifiers::NONE).await.unwrap()
    }

    async fn loaded(readonly: bool) -> App {
        let mut app = app(readonly);
        app.start();
        for _ in 0..20 {
            tokio::task::yield_now().await;
            app.pump();
        }
        app
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_keys() {
        let mut app = app(false);
        assert!(press(&mut app, KeyCode::Char('q')).await);
        assert!(handle_key_event(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL)
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readonly_blocks_actions() {
        let mut app = loaded(true).await;
        press(&mut app, KeyCode::Char('x')).await;
        assert_eq!(app.mode, Mode::Warning);
        assert!(app.pending_action.is_none());

        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.warning_message.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_defaults_to_no() {
        let mut app = loaded(false).await;
        press(&mut app, KeyCode::Char('x')).await;
        assert_eq!(app.mode, Mode::Confirm);

        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_with_y_runs_action() {
        let mut app = loaded(false).await;
        let target = app.selected_item().unwrap().meta().display_name.clone();

        press(&mut app, KeyCode::Char('x')).await;
        press(&mut app, KeyCode::Char('y')).await;

        assert_eq!(app.mode, Mode::Normal);
        let record = app.history.records().next().unwrap();
        assert_eq!(record.resource_name, target);
        assert!(app.scheduler().last_action().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_section_keys() {
        let mut app = loaded(false).await;
        press(&mut app, KeyCode::Char('3')).await;
        assert_eq!(app.section, ResourceKind::Container);
        press(&mut app, KeyCode::Tab).await;
        assert_eq!(app.section, ResourceKind::Compute);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_auto_refresh() {
        let mut app = loaded(false).await;
        assert!(app.scheduler().is_active());
        press(&mut app, KeyCode::Char('a')).await;
        assert!(!app.scheduler().is_active());
        press(&mut app, KeyCode::Char('a')).await;
        assert!(app.scheduler().is_active());
    }
}
