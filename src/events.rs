//! State change notifications
//!
//! State objects publish into an [`EventBus`]; each listener holds its own
//! [`Subscription`] and unsubscribes by dropping it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::constants;
use crate::model::{AppTheme, NotificationLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Amount changed by `delta` (on load, `delta` is the loaded amount)
    WaterAmountChanged { delta: i32, amount: i32 },

    /// Water preferences changed; `reschedule` asks for recomputed fire times
    WaterSettingsChanged { reschedule: bool },

    PersonChanged,

    NotificationsSettingChanged { level: NotificationLevel },

    ColorThemeChanged { theme: AppTheme },

    AutoStartupChanged { enabled: bool },

    /// A drink reminder came due
    ReminderDue { alarm: bool, amount: i32, target: i32 },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(constants::events::CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to every live subscriber. Having none is fine.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Take every event published since the last call without blocking
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Event subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }
}
