//! Action History
//!
//! Records every start/stop request with its outcome, and drives the toast
//! shown in the footer.

use crate::config::NotificationSettings;
use crate::resource::model::ResourceKind;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Start,
    Stop,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Stop => "Stop",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Start => "Started",
            Self::Stop => "Stopped",
        }
    }

    pub fn present_participle(&self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Stop => "Stopping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// Request sent, no answer yet
    Pending,
    /// Provider accepted the request
    Accepted(String),
    Failed(String),
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "◯",
            Self::Accepted(_) => "✓",
            Self::Failed(_) => "✗",
        }
    }
}

/// One start/stop request
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub id: Uuid,
    pub action: ActionType,
    pub kind: ResourceKind,
    pub account_name: String,
    pub resource_name: String,
    pub status: ActionStatus,
    pub requested_at: DateTime<Local>,
    started: Instant,
    finished: Option<Instant>,
}

impl ActionRecord {
    fn new(action: ActionType, kind: ResourceKind, account_name: String, resource_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            kind,
            account_name,
            resource_name,
            status: ActionStatus::Pending,
            requested_at: Local::now(),
            started: Instant::now(),
            finished: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.finished
            .unwrap_or_else(Instant::now)
            .duration_since(self.started)
    }

    /// Short line for the footer
    pub fn toast_message(&self) -> String {
        let icon = self.status.icon();
        match &self.status {
            ActionStatus::Pending => format!(
                "{} {} {}...",
                icon,
                self.action.present_participle(),
                self.resource_name
            ),
            ActionStatus::Accepted(message) => format!("{} {}", icon, message),
            ActionStatus::Failed(error) => format!(
                "{} {} {} failed: {}",
                icon,
                self.action.display_name(),
                self.resource_name,
                error
            ),
        }
    }

    /// Line for the history view
    pub fn history_line(&self) -> String {
        let verb = match self.status {
            ActionStatus::Failed(_) => self.action.display_name(),
            _ => self.action.past_tense(),
        };
        format!(
            "{} {} {} {} ({}) [{}ms]",
            self.requested_at.format("%H:%M:%S"),
            self.status.icon(),
            verb,
            self.resource_name,
            self.account_name,
            self.duration().as_millis()
        )
    }
}

pub struct ActionHistory {
    /// Most recent first
    records: VecDeque<ActionRecord>,
    max_history: usize,
    toast_duration: Duration,
    last_toast: Option<Instant>,
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(&NotificationSettings::default())
    }
}

impl ActionHistory {
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            records: VecDeque::new(),
            max_history: settings.max_history.max(1),
            toast_duration: Duration::from_secs(settings.toast_duration_secs),
            last_toast: None,
        }
    }

    pub fn begin(
        &mut self,
        action: ActionType,
        kind: ResourceKind,
        account_name: &str,
        resource_name: &str,
    ) -> Uuid {
        let record = ActionRecord::new(action, kind, account_name.to_string(), resource_name.to_string());
        let id = record.id;
        self.records.push_front(record);
        self.last_toast = Some(Instant::now());
        self.trim();
        id
    }

    pub fn accepted(&mut self, id: Uuid, message: String) {
        self.finish(id, ActionStatus::Accepted(message));
    }

    pub fn failed(&mut self, id: Uuid, error: String) {
        self.finish(id, ActionStatus::Failed(error));
    }

    fn finish(&mut self, id: Uuid, status: ActionStatus) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.status = status;
            record.finished = Some(Instant::now());
            self.last_toast = Some(Instant::now());
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&ActionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record while its toast is still visible
    pub fn current_toast(&self) -> Option<&ActionRecord> {
        match self.last_toast {
            Some(at) if at.elapsed() <= self.toast_duration => self.records.front(),
            _ => None,
        }
    }

    /// Drop the oldest finished records first
    fn trim(&mut self) {
        while self.records.len() > self.max_history {
            match self.records.iter().rposition(|r| r.status.is_terminal()) {
                Some(pos) => {
                    self.records.remove(pos);
                }
                None => {
                    self.records.pop_back();
                }
            }
        }
    }
}
