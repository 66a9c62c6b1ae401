//! IPC message types for client ↔ daemon communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::model::{AppTheme, ColorTheme, Gender, HealthStatus, NotificationLevel};
use crate::shell::ToastAction;

/// Requests sent from a client to the daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Request {
    /// Query the full state
    Status,

    /// Add a drink; `None` means one glass
    Drink { ml: Option<i32> },

    SetAmount(i32),
    SetTarget(i32),
    SetGlassSize(i32),
    SetReminderInterval(i32),
    SetReminderDelay(i32),
    SetNotificationLevel(NotificationLevel),
    SetColorTheme(ColorTheme),

    /// Desktop theme changed (pushed by a theme watcher)
    SetSystemTheme(AppTheme),

    /// Update any subset of the body information
    SetBody {
        gender: Option<Gender>,
        age: Option<u32>,
        weight: Option<f32>,
        height: Option<f32>,
    },

    SetAutoStartup(bool),

    /// Button pressed on a reminder notification
    Toast(ToastAction),

    /// Run the periodic watchdog now
    WatchdogTick,

    Suspend,
    Resume,

    /// Switch this connection to a stream of `Response::Event`
    Subscribe,

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Responses sent from the daemon to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Status(Box<StatusSnapshot>),

    /// Acknowledgment that request was processed
    Ready,

    /// Health check response
    Pong,

    /// Pushed on subscribed connections
    Event(Event),

    /// Request rejected (validation) or failed
    Error(String),
}

/// Everything a client needs to render the state
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub amount_ml: i32,
    pub target_ml: i32,
    pub glass_size_ml: i32,
    pub reminder_interval_minutes: i32,
    pub reminder_delay_minutes: i32,
    pub last_updated: DateTime<Utc>,
    pub next_reminder: Option<DateTime<Utc>>,

    pub notification_level: NotificationLevel,
    pub color_theme: ColorTheme,
    pub applied_theme: AppTheme,
    pub auto_startup_enabled: bool,
    pub can_toggle_auto_startup: bool,
    pub auto_startup_description: String,

    pub gender: Gender,
    pub age: u32,
    pub weight_kg: f32,
    pub height_m: f32,
    pub bmi: f32,
    pub health_status: HealthStatus,
    pub recommended_target_ml: i32,
}
