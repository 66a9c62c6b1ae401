//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Config and state file locations
pub mod config {
    /// Directory under the XDG config dir
    pub const APP_DIR: &str = "waterly";

    /// Daemon/client configuration file
    pub const FILENAME: &str = "config.toml";

    /// Key-value store holding the persisted records
    pub const STATE_FILENAME: &str = "state.json";

    /// Socket file name under the runtime dir
    pub const SOCKET_FILENAME: &str = "waterly.sock";
}

/// Top-level keys of the key-value store
pub mod keys {
    pub const BODY_INFORMATION: &str = "BodyInformation";
    pub const WATER: &str = "Water";
    pub const NOTIFICATIONS_LEVEL: &str = "NotificationsLevel";
    pub const COLOR_THEME: &str = "ColorTheme";
}

/// Water defaults and accepted ranges
pub mod water {
    use std::ops::RangeInclusive;

    pub const DEFAULT_REMINDER_INTERVAL: i32 = 30;
    pub const DEFAULT_REMINDER_DELAY: i32 = 5;
    pub const DEFAULT_GLASS_SIZE: i32 = 250;
    pub const DEFAULT_AMOUNT: i32 = 0;
    pub const DEFAULT_TARGET: i32 = 2000;

    /// Daily target in mL
    pub const TARGET_RANGE: RangeInclusive<i32> = 1..=10_000;

    /// Glass size in mL
    pub const GLASS_SIZE_RANGE: RangeInclusive<i32> = 1..=2_000;

    /// Reminder interval in minutes (up to one day)
    pub const REMINDER_INTERVAL_RANGE: RangeInclusive<i32> = 1..=1_440;

    /// Postpone delay in minutes (up to half a day)
    pub const REMINDER_DELAY_RANGE: RangeInclusive<i32> = 1..=720;
}

/// Body mass index bucket upper bounds (exclusive)
pub mod bmi {
    pub const UNDERWEIGHT_BELOW: f32 = 18.5;
    pub const HEALTHY_BELOW: f32 = 25.0;
    pub const OVERWEIGHT_BELOW: f32 = 30.0;
    pub const OBESE_BELOW: f32 = 40.0;
}

/// Background task timing
pub mod watchdog {
    /// Default cadence of the watchdog ticker
    pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

    /// Ticks within this many minutes after midnight count as the daily rollover
    pub const DEFAULT_ROLLOVER_WINDOW_MINUTES: i64 = 30;

    /// Watchdog cadence accepted from config (up to one day)
    pub const MIN_INTERVAL_MINUTES: u64 = 1;
    pub const MAX_INTERVAL_MINUTES: u64 = 1_440;

    /// Rollover window accepted from config (less than one day)
    pub const MAX_ROLLOVER_WINDOW_MINUTES: i64 = 1_439;

    /// Main loop wake-up when no reminder is armed
    pub const IDLE_WAIT_SECS: u64 = 60;
}

/// XDG autostart entry
pub mod autostart {
    pub const DIR: &str = "autostart";
    pub const DESKTOP_FILE: &str = "waterly.desktop";
    pub const SYSTEM_DIR: &str = "/etc/xdg/autostart";
    pub const HIDDEN_KEY: &str = "Hidden";
    pub const SESSION_ENABLED_KEY: &str = "X-GNOME-Autostart-enabled";
}

/// IPC limits
pub mod ipc {
    /// Maximum message size (1 MB)
    pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    /// How often a `watch` connection checks for new events and a closed peer
    pub const WATCH_POLL_MILLIS: u64 = 250;
}

/// Event fan-out
pub mod events {
    /// Events buffered per subscriber before it starts lagging
    pub const CHANNEL_CAPACITY: usize = 64;
}
