//! The persistent progress notice shown while a session is live.
//!
//! The notice itself is platform-neutral data. Whatever actually draws it
//! (a system notification, a console line) implements `ProgressSurface`.

use crate::events::{TimerCommand, TimerPhase, TimerSnapshot};
use std::time::Duration;
use tracing::debug;

pub const MEDITATING_TITLE: &str = "Stillness — Meditating";
pub const COMPLETE_TITLE: &str = "Session Complete";
pub const COMPLETE_TEXT: &str = "Your meditation session has ended";

/// A button on the progress notice. Each maps onto exactly one engine command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeAction {
    Pause,
    Resume,
    Stop,
}

impl NoticeAction {
    pub fn label(self) -> &'static str {
        match self {
            NoticeAction::Pause => "Pause",
            NoticeAction::Resume => "Resume",
            NoticeAction::Stop => "Stop",
        }
    }

    /// Matches a button label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        [NoticeAction::Pause, NoticeAction::Resume, NoticeAction::Stop]
            .into_iter()
            .find(|action| action.label().eq_ignore_ascii_case(label.trim()))
    }

    pub fn command(self) -> TimerCommand {
        match self {
            NoticeAction::Pause => TimerCommand::Pause,
            NoticeAction::Resume => TimerCommand::Resume,
            NoticeAction::Stop => TimerCommand::Stop,
        }
    }
}

/// Whole seconds elapsed out of whole seconds total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeProgress {
    pub max: u64,
    pub value: u64,
}

/// Rendered content of the progress notice.
///
/// Notices are never user-dismissable. The engine clears the surface when the
/// session returns to idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotice {
    pub title: String,
    pub text: String,
    pub progress: Option<NoticeProgress>,
    pub actions: Vec<NoticeAction>,
    /// True while the countdown is live; false once it has completed.
    pub ongoing: bool,
}

impl ProgressNotice {
    /// Renders the notice for a snapshot. Idle sessions have no notice.
    pub fn from_snapshot(snapshot: &TimerSnapshot) -> Option<Self> {
        match snapshot.phase {
            TimerPhase::Idle => None,
            TimerPhase::Completed => Some(Self {
                title: COMPLETE_TITLE.to_string(),
                text: COMPLETE_TEXT.to_string(),
                progress: None,
                actions: Vec::new(),
                ongoing: false,
            }),
            TimerPhase::Running | TimerPhase::Paused => {
                let max = ceil_secs(snapshot.total);
                let toggle = if snapshot.is_paused() {
                    NoticeAction::Resume
                } else {
                    NoticeAction::Pause
                };
                Some(Self {
                    title: MEDITATING_TITLE.to_string(),
                    text: format_remaining(snapshot.remaining),
                    progress: Some(NoticeProgress {
                        max,
                        value: max.saturating_sub(ceil_secs(snapshot.remaining)),
                    }),
                    actions: vec![toggle, NoticeAction::Stop],
                    ongoing: true,
                })
            }
        }
    }

    /// Whether the notice currently shows this button.
    pub fn offers(&self, action: NoticeAction) -> bool {
        self.actions.contains(&action)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    (duration.as_millis() as u64).div_ceil(1000)
}

/// Formats remaining time rounded up to the next whole second, so the notice
/// never reads "0:00" while the countdown is still going.
pub fn format_remaining(remaining: Duration) -> String {
    let total_seconds = ceil_secs(remaining);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02} remaining", hours, minutes, seconds)
    } else {
        format!("{}:{:02} remaining", minutes, seconds)
    }
}

/// Something that can display the progress notice.
pub trait ProgressSurface: Send + Sync + 'static {
    /// Shows or replaces the notice.
    fn post(&self, notice: &ProgressNotice);
    /// Removes the notice.
    fn clear(&self);
}

/// A surface that shows nothing. Used when no notification host is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSurface;

impl ProgressSurface for SilentSurface {
    fn post(&self, _notice: &ProgressNotice) {}
    fn clear(&self) {}
}

/// Feeds snapshots to a surface, skipping posts that would not change what
/// is on screen when throttling is on.
pub(crate) struct NoticePublisher {
    surface: std::sync::Arc<dyn ProgressSurface>,
    throttle: bool,
    last: Option<ProgressNotice>,
}

impl NoticePublisher {
    pub(crate) fn new(surface: std::sync::Arc<dyn ProgressSurface>, throttle: bool) -> Self {
        Self {
            surface,
            throttle,
            last: None,
        }
    }

    pub(crate) fn offer(&mut self, snapshot: &TimerSnapshot) {
        match ProgressNotice::from_snapshot(snapshot) {
            None => self.clear(),
            Some(notice) => {
                if self.throttle && self.last.as_ref() == Some(&notice) {
                    return;
                }
                debug!(title = %notice.title, text = %notice.text, "Posting progress notice");
                self.surface.post(&notice);
                self.last = Some(notice);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        if self.last.take().is_some() {
            debug!("Clearing progress notice");
            self.surface.clear();
        }
    }
}
