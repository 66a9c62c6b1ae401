//! Start-with-session support through XDG autostart entries
//!
//! A user entry in `~/.config/autostart` is ours to toggle. An entry under
//! `/etc/xdg/autostart` belongs to the administrator and overrides it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::autostart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupTaskState {
    Enabled,
    Disabled,
    EnabledByPolicy,
    DisabledByPolicy,
    /// Turned off from the desktop's session settings, not by us
    DisabledByUser,
}

pub trait StartupTask: Send {
    fn state(&self) -> StartupTaskState;

    /// Enable the task if the current state allows it; returns the resulting state
    fn request_enable(&mut self) -> Result<StartupTaskState>;

    fn disable(&mut self) -> Result<()>;
}

pub struct XdgAutostart {
    user_entry: PathBuf,
    system_entry: PathBuf,
    exec: PathBuf,
}

impl XdgAutostart {
    /// Entry paths for the current user; `None` if there is no config dir
    pub fn for_current_user() -> Option<Self> {
        let user_dir = dirs::config_dir()?.join(autostart::DIR);
        let exec = std::env::current_exe().ok()?;
        Some(Self::with_paths(
            user_dir.join(autostart::DESKTOP_FILE),
            Path::new(autostart::SYSTEM_DIR).join(autostart::DESKTOP_FILE),
            exec,
        ))
    }

    pub fn with_paths(user_entry: PathBuf, system_entry: PathBuf, exec: PathBuf) -> Self {
        Self {
            user_entry,
            system_entry,
            exec,
        }
    }

    fn desktop_entry(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Waterly\n\
             Comment=Drink reminders\n\
             Exec={} daemon\n\
             X-GNOME-Autostart-enabled=true\n",
            self.exec.display()
        )
    }
}

/// Value of `key=...` in a desktop entry, compared case-insensitively
fn entry_flag(contents: &str, key: &str) -> Option<bool> {
    contents.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        if k.trim() == key {
            Some(v.trim().eq_ignore_ascii_case("true"))
        } else {
            None
        }
    })
}

impl StartupTask for XdgAutostart {
    fn state(&self) -> StartupTaskState {
        if let Ok(contents) = fs::read_to_string(&self.system_entry) {
            return if entry_flag(&contents, autostart::HIDDEN_KEY) == Some(true) {
                StartupTaskState::DisabledByPolicy
            } else {
                StartupTaskState::EnabledByPolicy
            };
        }

        match fs::read_to_string(&self.user_entry) {
            Ok(contents) => {
                if entry_flag(&contents, autostart::SESSION_ENABLED_KEY) == Some(false) {
                    StartupTaskState::DisabledByUser
                } else if entry_flag(&contents, autostart::HIDDEN_KEY) == Some(true) {
                    StartupTaskState::Disabled
                } else {
                    StartupTaskState::Enabled
                }
            }
            Err(_) => StartupTaskState::Disabled,
        }
    }

    fn request_enable(&mut self) -> Result<StartupTaskState> {
        if self.state() != StartupTaskState::Disabled {
            return Ok(self.state());
        }

        if let Some(parent) = self.user_entry.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create autostart directory {:?}", parent))?;
        }
        fs::write(&self.user_entry, self.desktop_entry())
            .with_context(|| format!("Failed to write autostart entry {:?}", self.user_entry))?;

        info!(path = %self.user_entry.display(), "Enabled autostart");
        Ok(self.state())
    }

    fn disable(&mut self) -> Result<()> {
        if self.state() != StartupTaskState::Enabled {
            return Ok(());
        }
        fs::remove_file(&self.user_entry)
            .with_context(|| format!("Failed to remove autostart entry {:?}", self.user_entry))?;
        info!(path = %self.user_entry.display(), "Disabled autostart");
        Ok(())
    }
}
