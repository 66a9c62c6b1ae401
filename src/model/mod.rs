//! Persisted user and application state
//!
//! - **water**: daily intake counter and reminder preferences
//! - **person**: body information and BMI classification
//! - **settings**: notification level, theme, autostart
//! - **user**: person + water loaded and saved as one unit

pub mod person;
pub mod settings;
pub mod user;
pub mod water;

pub use person::{Gender, HealthStatus, PersonState};
pub use settings::{AppTheme, ColorTheme, NotificationLevel, SettingsState};
pub use user::UserData;
pub use water::WaterState;
