use crate::session::Snapshot;
use crate::workflow::{Notification, NotificationLevel, WorkflowState};

/// Severity bucket of a confidence percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

pub fn tier(confidence: u8) -> Tier {
    if confidence >= 80 {
        Tier::High
    } else if confidence >= 60 {
        Tier::Medium
    } else {
        Tier::Low
    }
}

pub fn render_state(state: &WorkflowState) -> String {
    match state {
        WorkflowState::Idle => "Drop or pick a photo of a car".to_string(),
        WorkflowState::Selected { image } => {
            format!("Selected {} ({})", image.source_filename(), image.mime_type())
        }
        WorkflowState::Analyzing { image, token } => {
            format!("Analyzing {} [{}]...", image.source_filename(), token)
        }
        WorkflowState::Completed { image, result } => format!(
            "{}: {} {}% ({} confidence)",
            image.source_filename(),
            result.brand,
            result.confidence,
            result.tier().as_str()
        ),
        WorkflowState::Failed { image, error } => format!(
            "{}: analysis failed ({} error)",
            image.source_filename(),
            error.kind().as_str()
        ),
    }
}

pub fn render_snapshot(snapshot: &Snapshot) -> String {
    match &snapshot.state {
        WorkflowState::Idle if snapshot.dragging => "Drop the image here".to_string(),
        state => render_state(state),
    }
}

pub fn render_notification(notification: &Notification) -> String {
    let marker = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    format!(
        "[{}] {}: {}",
        marker, notification.title, notification.description
    )
}
