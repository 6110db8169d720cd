// todo-plus/src/reminder.rs

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReminderType {
    /// Fire once, every time the workspace starts up.
    OnStartup,
    /// Fire once, `value` milliseconds after `start_date`.
    Timer,
    /// Fire repeatedly, every `value` milliseconds.
    Interval,
    /// Fire once at the absolute timestamp in `value`.
    Date,
}

/// Scheduled-notification descriptor attached to a tracked annotation.
/// Field names match the sidecar JSON format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderInfo {
    #[serde(rename = "reminderType")]
    pub reminder_type: ReminderType,
    #[serde(rename = "reminderStartDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[serde(rename = "reminderValue", skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

/// What the scheduler should do with a reminder, evaluated at `now_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReminderAction {
    FireNow,
    FireAfter(Duration),
    FireEvery(Duration),
    Nothing,
}

impl ReminderInfo {
    /// Resolve this descriptor into a concrete action. `startup` is true only
    /// during the initial workspace scan; `OnStartup` reminders fire then and
    /// only then.
    pub fn next_action(&self, now_ms: i64, startup: bool) -> ReminderAction {
        match self.reminder_type {
            ReminderType::OnStartup => {
                if startup {
                    ReminderAction::FireNow
                } else {
                    ReminderAction::Nothing
                }
            }
            ReminderType::Timer => {
                let (Some(start), Some(value)) = (self.start_date, self.value) else {
                    return ReminderAction::Nothing;
                };
                let elapsed = now_ms - start;
                if elapsed > value {
                    ReminderAction::FireNow
                } else {
                    ReminderAction::FireAfter(Duration::from_millis((value - elapsed) as u64))
                }
            }
            ReminderType::Interval => match self.value {
                Some(v) if v > 0 => ReminderAction::FireEvery(Duration::from_millis(v as u64)),
                _ => ReminderAction::Nothing,
            },
            ReminderType::Date => {
                let Some(when) = self.value else {
                    return ReminderAction::Nothing;
                };
                let diff = when - now_ms;
                if diff <= 0 {
                    ReminderAction::FireNow
                } else {
                    ReminderAction::FireAfter(Duration::from_millis(diff as u64))
                }
            }
        }
    }
}

/// Emitted when a scheduled reminder comes due. Delivery (pop-ups, status
/// bars) is the consumer's problem.
#[derive(Clone, Debug)]
pub struct ReminderEvent {
    pub id: String,
    pub file_uri: String,
    pub text: String,
}

/// Arms one tokio timer per annotation id. Re-arming an id replaces its
/// previous timer, mirroring the one-timer-per-id table of the original
/// notification manager.
pub struct ReminderScheduler {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    tx: mpsc::UnboundedSender<ReminderEvent>,
}

impl ReminderScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReminderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    /// Arm (or re-arm) the timer for one annotation. No-op for annotations
    /// without an id or without a reminder.
    pub fn arm(&self, id: &str, file_uri: &str, text: &str, info: &ReminderInfo, startup: bool) {
        self.disarm(id);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let event = ReminderEvent {
            id: id.to_string(),
            file_uri: file_uri.to_string(),
            text: text.to_string(),
        };
        let tx = self.tx.clone();
        let handle = match info.next_action(now_ms, startup) {
            ReminderAction::FireNow => {
                let _ = tx.send(event);
                return;
            }
            ReminderAction::FireAfter(delay) => tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(event);
            }),
            ReminderAction::FireEvery(period) => tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // first tick completes immediately
                loop {
                    ticker.tick().await;
                    if tx.send(event.clone()).is_err() {
                        break;
                    }
                }
            }),
            ReminderAction::Nothing => return,
        };
        debug!(id, "armed reminder");
        self.timers.lock().insert(id.to_string(), handle);
    }

    pub fn disarm(&self, id: &str) {
        if let Some(handle) = self.timers.lock().remove(id) {
            handle.abort();
        }
    }

    pub fn disarm_all(&self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
