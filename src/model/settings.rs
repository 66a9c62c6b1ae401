//! Application settings: reminder level, color theme, autostart
//!
//! Level and theme are stored as flat integers. Autostart is not stored at all,
//! it is read back from the startup task every time.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::autostart::{StartupTask, StartupTaskState};
use crate::constants::keys;
use crate::events::{Event, EventBus};
use crate::store::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum NotificationLevel {
    Disabled,
    Standard,
    Alarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ColorTheme {
    Light,
    Dark,
    System,
}

/// Theme actually applied to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AppTheme {
    Light,
    Dark,
}

impl From<NotificationLevel> for i64 {
    fn from(level: NotificationLevel) -> Self {
        match level {
            NotificationLevel::Disabled => 0,
            NotificationLevel::Standard => 1,
            NotificationLevel::Alarm => 2,
        }
    }
}

impl TryFrom<i64> for NotificationLevel {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NotificationLevel::Disabled),
            1 => Ok(NotificationLevel::Standard),
            2 => Ok(NotificationLevel::Alarm),
            other => Err(other),
        }
    }
}

impl From<ColorTheme> for i64 {
    fn from(theme: ColorTheme) -> Self {
        match theme {
            ColorTheme::Light => 0,
            ColorTheme::Dark => 1,
            ColorTheme::System => 2,
        }
    }
}

impl TryFrom<i64> for ColorTheme {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ColorTheme::Light),
            1 => Ok(ColorTheme::Dark),
            2 => Ok(ColorTheme::System),
            other => Err(other),
        }
    }
}

/// Best guess at the desktop theme from `GTK_THEME` (e.g. `Adwaita:dark`)
pub fn detect_system_theme() -> AppTheme {
    match std::env::var("GTK_THEME") {
        Ok(theme) if theme.to_lowercase().contains("dark") => AppTheme::Dark,
        _ => AppTheme::Light,
    }
}

pub struct SettingsState {
    notification_level: NotificationLevel,
    color_theme: ColorTheme,
    system_theme: AppTheme,
    startup_task: Option<Box<dyn StartupTask>>,

    store: Arc<dyn KeyValueStore>,
    events: EventBus,
}

impl SettingsState {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        events: EventBus,
        startup_task: Option<Box<dyn StartupTask>>,
        system_theme: AppTheme,
    ) -> Self {
        Self {
            notification_level: NotificationLevel::Standard,
            color_theme: ColorTheme::System,
            system_theme,
            startup_task,
            store,
            events,
        }
    }

    pub fn notification_level(&self) -> NotificationLevel {
        self.notification_level
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notification_level != NotificationLevel::Disabled
    }

    /// Changing the level only toggles reminders, it never moves their fire times
    pub fn set_notification_level(&mut self, level: NotificationLevel) {
        if self.notification_level == level {
            return;
        }
        self.notification_level = level;
        self.write_scalar(keys::NOTIFICATIONS_LEVEL, level.into());

        info!(level = ?level, "Notification level changed");
        self.events.publish(Event::NotificationsSettingChanged { level });
    }

    pub fn color_theme(&self) -> ColorTheme {
        self.color_theme
    }

    pub fn set_color_theme(&mut self, theme: ColorTheme) {
        if self.color_theme == theme {
            return;
        }
        self.color_theme = theme;
        self.write_scalar(keys::COLOR_THEME, theme.into());

        self.events.publish(Event::ColorThemeChanged {
            theme: self.requested_theme(),
        });
    }

    pub fn requested_theme(&self) -> AppTheme {
        match self.color_theme {
            ColorTheme::Light => AppTheme::Light,
            ColorTheme::Dark => AppTheme::Dark,
            ColorTheme::System => self.system_theme,
        }
    }

    /// Desktop theme changed outside the app
    pub fn system_theme_changed(&mut self, theme: AppTheme) {
        self.system_theme = theme;
        debug!(theme = ?theme, "System theme changed");
        if self.color_theme == ColorTheme::System {
            self.events.publish(Event::ColorThemeChanged { theme });
        }
    }

    /// Whether the user, rather than the OS, controls autostart right now
    pub fn can_toggle_auto_startup(&self) -> bool {
        matches!(
            self.startup_state(),
            Some(StartupTaskState::Enabled | StartupTaskState::Disabled)
        )
    }

    pub fn auto_startup_enabled(&self) -> bool {
        matches!(
            self.startup_state(),
            Some(StartupTaskState::Enabled | StartupTaskState::EnabledByPolicy)
        )
    }

    pub fn auto_startup_description(&self) -> &'static str {
        match self.startup_state() {
            None => "Automatic startup is not available",
            Some(StartupTaskState::Enabled | StartupTaskState::Disabled) => "",
            Some(StartupTaskState::EnabledByPolicy | StartupTaskState::DisabledByPolicy) => {
                "Automatic startup is controlled by a system policy"
            }
            Some(StartupTaskState::DisabledByUser) => {
                "Automatic startup was turned off in the session settings"
            }
        }
    }

    /// Try to apply the requested autostart setting. The OS may refuse;
    /// listeners get the state that actually resulted.
    pub fn try_change_auto_startup(&mut self, enabled: bool) {
        let Some(task) = self.startup_task.as_mut() else {
            return;
        };

        if enabled {
            if task.state() != StartupTaskState::Disabled {
                return;
            }
            if let Err(e) = task.request_enable() {
                error!(error = ?e, "Failed to enable autostart");
            }
            let enabled = self.auto_startup_enabled();
            self.events.publish(Event::AutoStartupChanged { enabled });
        } else {
            if task.state() != StartupTaskState::Enabled {
                return;
            }
            if let Err(e) = task.disable() {
                error!(error = ?e, "Failed to disable autostart");
            }
            self.events.publish(Event::AutoStartupChanged { enabled: false });
        }
    }

    /// Load level and theme, falling back to Standard/System per value
    pub fn load(&mut self) {
        self.notification_level = self
            .read_scalar(keys::NOTIFICATIONS_LEVEL)
            .and_then(|v| NotificationLevel::try_from(v).ok())
            .unwrap_or(NotificationLevel::Standard);
        self.color_theme = self
            .read_scalar(keys::COLOR_THEME)
            .and_then(|v| ColorTheme::try_from(v).ok())
            .unwrap_or(ColorTheme::System);

        info!(
            notifications = ?self.notification_level,
            theme = ?self.color_theme,
            autostart = ?self.startup_state(),
            "Loaded settings"
        );
    }

    pub fn save(&self) {
        self.write_scalar(keys::NOTIFICATIONS_LEVEL, self.notification_level.into());
        self.write_scalar(keys::COLOR_THEME, self.color_theme.into());
    }

    fn startup_state(&self) -> Option<StartupTaskState> {
        self.startup_task.as_ref().map(|task| task.state())
    }

    fn read_scalar(&self, key: &str) -> Option<i64> {
        match self.store.get(key) {
            Ok(Some(value)) => {
                let parsed = value.as_i64();
                if parsed.is_none() {
                    warn!(key = key, value = %value, "Ignoring non-integer setting");
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                error!(key = key, error = %e, "Failed to read setting");
                None
            }
        }
    }

    fn write_scalar(&self, key: &str, value: i64) {
        if let Err(e) = self.store.set(key, Value::from(value)) {
            error!(key = key, error = %e, "Failed to save setting");
        }
    }
}
