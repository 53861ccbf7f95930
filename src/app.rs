//! Application State
//!
//! Central application state for cost-saver: per-section snapshots, the
//! refresh scheduler, selection, confirmation and the action history.
//!
//! Listings run as spawned tasks and report back over a channel; [`App::pump`]
//! applies them on the UI thread. Start/stop requests are awaited inline by
//! the event loop, so no second action can be submitted while one runs.

use crate::cloud::PublicAccount;
use crate::config::Config;
use crate::error::{format_error, Result};
use crate::notification::{ActionHistory, ActionType};
use crate::resource::adapter::Ack;
use crate::resource::aggregator::FanOut;
use crate::resource::fleet::Fleet;
use crate::resource::model::{ManagedResource, PowerManaged, ResourceKind, ResourceRef};
use crate::scheduler::{Scheduler, SchedulerEvent};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

// =========================================================================
// Configuration Constants
// =========================================================================

/// Default viewport height (updated during render based on terminal size)
const DEFAULT_VIEWPORT_HEIGHT: usize = 20;

/// Delay before the follow-up listing after an accepted action
pub const POST_ACTION_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Application modes
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Normal,  // Viewing list
    Help,    // ? help popup
    Confirm, // Start/stop confirmation
    Warning, // Warning/info dialog (OK only)
}

/// Start/stop waiting for confirmation
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub action: ActionType,
    pub kind: ResourceKind,
    pub account_id: String,
    pub target: ResourceRef,
    pub resource_name: String,
    pub message: String,
    pub selected_yes: bool,
}

/// Messages from background tasks to the UI thread
#[derive(Debug)]
enum AppMessage {
    Refreshed {
        kind: ResourceKind,
        result: std::result::Result<FanOut, String>,
    },
    RefreshRequested,
}

/// Main application state
pub struct App {
    fleet: Arc<Fleet>,

    // Snapshots per section, replaced wholesale by each listing
    snapshots: HashMap<ResourceKind, Vec<ManagedResource>>,
    pub section: ResourceKind,

    // Refresh scheduling
    scheduler: Scheduler,
    scheduler_events: UnboundedReceiver<SchedulerEvent>,
    messages_tx: UnboundedSender<AppMessage>,
    messages: UnboundedReceiver<AppMessage>,

    // Navigation state
    pub selected: usize,
    pub mode: Mode,
    pub pending_action: Option<PendingAction>,

    // Status line
    pub error_message: Option<String>,
    pub refresh_warning: Option<String>,
    pub warning_message: Option<String>,

    pub config: Config,
    pub readonly: bool,
    pub history: ActionHistory,

    // Virtual scrolling
    pub viewport_height: usize,
    pub scroll_offset: usize,
}

impl App {
    pub fn new(fleet: Arc<Fleet>, config: Config, section: ResourceKind, readonly: bool) -> Self {
        let (scheduler, scheduler_events) = Scheduler::new();
        let (messages_tx, messages) = mpsc::unbounded_channel();
        let history = ActionHistory::new(&config.notifications);

        Self {
            fleet,
            snapshots: HashMap::new(),
            section,
            scheduler,
            scheduler_events,
            messages_tx,
            messages,
            selected: 0,
            mode: Mode::Normal,
            pending_action: None,
            error_message: None,
            refresh_warning: None,
            warning_message: None,
            config,
            readonly,
            history,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_offset: 0,
        }
    }

    /// First listing, and the scheduler if auto-refresh is on
    pub fn start(&mut self) {
        if self.config.auto_refresh {
            self.scheduler.start(snapshot_of(&self.snapshots, self.section));
        }
        self.refresh_now();
    }

    // =========================================================================
    // Exposed control surface
    // =========================================================================

    /// Latest snapshot for a section (empty until first listed)
    pub fn snapshot(&self, kind: ResourceKind) -> &[ManagedResource] {
        snapshot_of(&self.snapshots, kind)
    }

    pub fn current_snapshot(&self) -> &[ManagedResource] {
        self.snapshot(self.section)
    }

    pub async fn request_start(&mut self, kind: ResourceKind, account_id: &str, target: &ResourceRef) -> Result<Ack> {
        self.run_action(ActionType::Start, kind, account_id, target).await
    }

    pub async fn request_stop(&mut self, kind: ResourceKind, account_id: &str, target: &ResourceRef) -> Result<Ack> {
        self.run_action(ActionType::Stop, kind, account_id, target).await
    }

    /// Turn auto-refresh on or off and remember the choice
    pub fn set_scheduler_active(&mut self, active: bool) {
        if active {
            self.scheduler.start(snapshot_of(&self.snapshots, self.section));
        } else {
            self.scheduler.stop();
        }
        if let Err(e) = self.config.set_auto_refresh(active) {
            tracing::warn!("Failed to save auto-refresh setting: {}", e);
        }
    }

    pub fn countdown_seconds(&self) -> u64 {
        self.scheduler.countdown_seconds()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn account_count(&self) -> usize {
        self.fleet.registry().len()
    }

    /// Configured accounts without credentials, for the help view
    pub fn accounts(&self) -> Vec<PublicAccount> {
        self.fleet.public_accounts()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// List the active section in the background. False if a listing is
    /// already running.
    pub fn refresh_now(&mut self) -> bool {
        if !self.scheduler.begin_refresh() {
            tracing::debug!("Refresh already in flight");
            return false;
        }

        let kind = self.section;
        let fleet = self.fleet.clone();
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            // Inner task so a panicking listing still reports back
            let result = tokio::spawn(async move { fleet.list(kind).await })
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppMessage::Refreshed { kind, result });
        });
        true
    }

    pub fn is_refreshing(&self) -> bool {
        self.scheduler.is_refreshing()
    }

    /// Apply everything background tasks and timers have posted since the last call
    pub fn pump(&mut self) {
        while let Ok(event) = self.scheduler_events.try_recv() {
            if self.scheduler.handle(event) {
                self.refresh_now();
            }
        }

        while let Ok(message) = self.messages.try_recv() {
            match message {
                AppMessage::Refreshed { kind, result } => self.apply_refresh(kind, result),
                AppMessage::RefreshRequested => {
                    self.refresh_now();
                }
            }
        }
    }

    fn apply_refresh(&mut self, kind: ResourceKind, result: std::result::Result<FanOut, String>) {
        match result {
            Ok(out) => {
                self.refresh_warning = out.failure_summary();
                tracing::debug!("Listed {} {} resources", out.resources.len(), kind);
                self.snapshots.insert(kind, out.resources);
            }
            Err(e) => {
                // Snapshot stays as it was
                tracing::error!("Refresh of {} failed: {}", kind, e);
                self.refresh_warning = Some(format!("Refresh failed: {}", e));
            }
        }

        self.scheduler
            .finish_refresh(snapshot_of(&self.snapshots, self.section));
        self.clamp_selection();

        // The section changed while this listing ran; the new one is still owed
        if kind != self.section {
            tracing::debug!("Listing {} now that {} has landed", self.section, kind);
            self.refresh_now();
        }
    }

    fn schedule_refresh(&self, delay: Duration) {
        let tx = self.messages_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppMessage::RefreshRequested);
        });
    }

    // =========================================================================
    // Actions
    // =========================================================================

    async fn run_action(
        &mut self,
        action: ActionType,
        kind: ResourceKind,
        account_id: &str,
        target: &ResourceRef,
    ) -> Result<Ack> {
        let account_name = self
            .fleet
            .registry()
            .get(account_id)
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|_| account_id.to_string());
        let resource_name = self.resource_name(kind, account_id, target);
        let id = self.history.begin(action, kind, &account_name, &resource_name);

        let result = match action {
            ActionType::Start => self.fleet.start(kind, account_id, target).await,
            ActionType::Stop => self.fleet.stop(kind, account_id, target).await,
        };

        match &result {
            Ok(ack) => {
                self.history.accepted(id, ack.message.clone());
                self.error_message = None;
                self.scheduler.record_action();
                self.scheduler
                    .rearm(snapshot_of(&self.snapshots, self.section));
                self.schedule_refresh(POST_ACTION_REFRESH_DELAY);
            }
            Err(e) => {
                let message = format_error(e);
                tracing::warn!(
                    kind = e.kind(),
                    "{} {} failed: {}",
                    action.display_name(),
                    target,
                    message
                );
                self.history.failed(id, message.clone());
                self.error_message = Some(message);
            }
        }
        result
    }

    fn resource_name(&self, kind: ResourceKind, account_id: &str, target: &ResourceRef) -> String {
        self.snapshot(kind)
            .iter()
            .find(|r| r.account_id() == account_id && &r.resource_ref() == target)
            .map(|r| r.meta().display_name.clone())
            .unwrap_or_else(|| target.to_string())
    }

    /// Build a confirmation for the selected resource
    pub fn create_pending_action(&self, action: ActionType) -> Option<PendingAction> {
        let item = self.selected_item()?;
        let name = item.meta().display_name.clone();

        Some(PendingAction {
            action,
            kind: item.kind(),
            account_id: item.account_id().to_string(),
            target: item.resource_ref(),
            message: format!(
                "{} '{}' in {}?",
                action.display_name(),
                name,
                item.meta().account_name
            ),
            resource_name: name,
            selected_yes: action == ActionType::Start,
        })
    }

    /// Run the confirmed action, if any. Errors end up in `error_message`.
    pub async fn execute_pending(&mut self) {
        let Some(pending) = self.pending_action.take() else {
            return;
        };
        self.exit_mode();

        let _ = match pending.action {
            ActionType::Start => {
                self.request_start(pending.kind, &pending.account_id, &pending.target)
                    .await
            }
            ActionType::Stop => {
                self.request_stop(pending.kind, &pending.account_id, &pending.target)
                    .await
            }
        };
    }

    // =========================================================================
    // Sections
    // =========================================================================

    /// Show another section; the outstanding cycle is cancelled and re-armed
    /// for the new section's snapshot. If a listing is already running the
    /// new section is listed as soon as it lands.
    pub fn switch_section(&mut self, kind: ResourceKind) {
        if kind == self.section {
            return;
        }
        self.section = kind;
        self.selected = 0;
        self.scroll_offset = 0;

        self.scheduler
            .rearm(snapshot_of(&self.snapshots, self.section));
        self.refresh_now();

        if let Err(e) = self.config.set_last_section(kind.key()) {
            tracing::warn!("Failed to save last section: {}", e);
        }
    }

    pub fn next_section(&mut self) {
        self.switch_section(self.section.next());
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn selected_item(&self) -> Option<&ManagedResource> {
        self.current_snapshot().get(self.selected)
    }

    pub fn next(&mut self) {
        let len = self.current_snapshot().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn go_to_top(&mut self) {
        self.selected = 0;
    }

    pub fn go_to_bottom(&mut self) {
        self.selected = self.current_snapshot().len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.current_snapshot().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn update_viewport(&mut self, height: usize) {
        self.viewport_height = height.max(1);
    }

    /// Ensure the selected item is visible in the viewport
    pub fn ensure_visible(&mut self) {
        let len = self.current_snapshot().len();
        if len == 0 {
            self.scroll_offset = 0;
            return;
        }

        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + self.viewport_height {
            self.scroll_offset = self.selected + 1 - self.viewport_height;
        }

        let max_offset = len.saturating_sub(self.viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    /// Range of rows currently on screen
    pub fn visible_range(&self) -> Range<usize> {
        let start = self.scroll_offset;
        let end = (self.scroll_offset + self.viewport_height).min(self.current_snapshot().len());
        start..end
    }

    // =========================================================================
    // Mode Transitions
    // =========================================================================

    pub fn enter_help_mode(&mut self) {
        self.mode = Mode::Help;
    }

    pub fn enter_confirm_mode(&mut self, pending: PendingAction) {
        self.pending_action = Some(pending);
        self.mode = Mode::Confirm;
    }

    pub fn show_warning(&mut self, message: &str) {
        self.warning_message = Some(message.to_string());
        self.mode = Mode::Warning;
    }

    pub fn exit_mode(&mut self) {
        self.mode = Mode::Normal;
        self.pending_action = None;
    }

    /// Text for the footer: an error wins over a partial listing, which wins over a toast
    pub fn status_line(&self) -> Option<String> {
        self.error_message
            .clone()
            .or_else(|| self.refresh_warning.clone())
            .or_else(|| self.history.current_toast().map(|r| r.toast_message()))
    }
}

fn snapshot_of(snapshots: &HashMap<ResourceKind, Vec<ManagedResource>>, kind: ResourceKind) -> &[ManagedResource] {
    snapshots.get(&kind).map(Vec::as_slice).unwrap_or(&[])
}
