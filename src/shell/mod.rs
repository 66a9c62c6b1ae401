//! Application shell
//!
//! [`App`] owns every piece of state for the life of the process and is the
//! only thing that mutates it. The daemon feeds it commands one at a time;
//! the offline CLI builds one, runs a single request and drops it.

pub mod daemon;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::autostart::StartupTask;
use crate::clock::{Clock, DayBoundary};
use crate::config::Config;
use crate::error::ValidationError;
use crate::events::{Event, EventBus, Subscription};
use crate::ipc::{Request, Response, StatusSnapshot};
use crate::model::{AppTheme, NotificationLevel, SettingsState, UserData};
use crate::scheduler::{NotificationScheduler, ReminderPolicy};
use crate::store::KeyValueStore;

/// Button on a reminder notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ToastAction {
    /// "I drank a glass"
    Confirm,
    /// "Remind me later"
    Postpone,
}

/// Externally triggered background work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTask {
    ToastAction(ToastAction),
    ReminderWatchdog,
}

pub struct App {
    pub user: UserData,
    pub settings: SettingsState,
    scheduler: Box<dyn NotificationScheduler>,
    events: EventBus,
    inbox: Subscription,
    clock: Arc<dyn Clock>,
    day: DayBoundary,
    rollover_window: Duration,
}

impl App {
    pub fn new(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn NotificationScheduler>,
        startup_task: Option<Box<dyn StartupTask>>,
        system_theme: AppTheme,
    ) -> Self {
        let events = EventBus::new();
        // Subscribe before anything loads so the initial reschedule is seen
        let inbox = events.subscribe();

        Self {
            user: UserData::new(store.clone(), clock.clone(), config.day_boundary, events.clone()),
            settings: SettingsState::new(store, events.clone(), startup_task, system_theme),
            scheduler,
            events,
            inbox,
            clock,
            day: config.day_boundary,
            rollover_window: Duration::minutes(config.rollover_window_minutes),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Load settings and user data, then arm reminders
    pub fn load(&mut self) {
        self.settings.load();
        self.user.load();
        self.dispatch_events();
        info!(
            next_reminder = ?self.scheduler.next_fire(),
            notifications = self.settings.notifications_enabled(),
            "Application state loaded"
        );
    }

    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            level: self.settings.notification_level(),
            interval_minutes: self.user.water.reminder_interval(),
            delay_minutes: self.user.water.reminder_delay(),
        }
    }

    pub fn next_reminder(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.scheduler.next_fire()
    }

    /// Forward pending state events to the scheduler
    pub fn dispatch_events(&mut self) {
        for event in self.inbox.drain() {
            match event {
                Event::WaterSettingsChanged { reschedule } => {
                    let policy = self.reminder_policy();
                    self.scheduler.reschedule(&policy, reschedule);
                }
                Event::NotificationsSettingChanged { .. } => {
                    let policy = self.reminder_policy();
                    self.scheduler.reschedule(&policy, false);
                }
                _ => {}
            }
        }
    }

    pub fn handle_background(&mut self, task: BackgroundTask) {
        debug!(task = ?task, "Background task activated");
        match task {
            BackgroundTask::ToastAction(ToastAction::Confirm) => {
                let glass = self.user.water.glass_size();
                if let Err(e) = self.user.water.add_amount(glass) {
                    warn!(error = %e, "Ignoring confirmed glass");
                }
            }
            BackgroundTask::ToastAction(ToastAction::Postpone) => {
                let policy = self.reminder_policy();
                self.scheduler.postpone(policy.delay_minutes);
            }
            BackgroundTask::ReminderWatchdog => {
                let policy = self.reminder_policy();
                if self.in_rollover_window() {
                    info!("Watchdog tick after midnight, resetting daily progress");
                    self.user.water.set_amount(0);
                    self.scheduler.reschedule(&policy, true);
                } else {
                    self.scheduler.check_schedule(&policy);
                }
            }
        }
        self.dispatch_events();
    }

    fn in_rollover_window(&self) -> bool {
        let time = self.day.time_of_day(self.clock.now());
        let midnight = chrono::NaiveTime::MIN;
        time <= midnight + self.rollover_window
    }

    /// Fire the reminder if it is due
    pub fn fire_due_reminders(&mut self) {
        let policy = self.reminder_policy();
        if !self.scheduler.take_due(&policy, self.clock.now()) {
            return;
        }

        let water = &self.user.water;
        let alarm = policy.level == NotificationLevel::Alarm;
        info!(
            amount = water.amount(),
            target = water.target(),
            alarm = alarm,
            "Time to drink a glass of water"
        );
        self.events.publish(Event::ReminderDue {
            alarm,
            amount: water.amount(),
            target: water.target(),
        });
        // Our own ReminderDue is not for the scheduler
        self.inbox.drain();
    }

    /// Flush everything to the store
    pub fn suspend(&mut self) {
        info!("Suspending, saving state");
        self.settings.save();
        self.user.save();
        self.inbox.drain();
    }

    /// Catch up on a day change and on reminders missed while suspended
    pub fn resume(&mut self) {
        info!("Resuming");
        let policy = self.reminder_policy();
        if self.user.water.is_stale() {
            self.user.water.set_amount(0);
            self.scheduler.reschedule(&policy, true);
        } else {
            self.scheduler.check_schedule(&policy);
        }
        self.dispatch_events();
    }

    pub fn status(&self) -> StatusSnapshot {
        let water = &self.user.water;
        let person = &self.user.person;
        StatusSnapshot {
            amount_ml: water.amount(),
            target_ml: water.target(),
            glass_size_ml: water.glass_size(),
            reminder_interval_minutes: water.reminder_interval(),
            reminder_delay_minutes: water.reminder_delay(),
            last_updated: water.last_updated(),
            next_reminder: self.scheduler.next_fire(),
            notification_level: self.settings.notification_level(),
            color_theme: self.settings.color_theme(),
            applied_theme: self.settings.requested_theme(),
            auto_startup_enabled: self.settings.auto_startup_enabled(),
            can_toggle_auto_startup: self.settings.can_toggle_auto_startup(),
            auto_startup_description: self.settings.auto_startup_description().to_string(),
            gender: person.gender(),
            age: person.age(),
            weight_kg: person.weight(),
            height_m: person.height(),
            bmi: person.body_mass_index(),
            health_status: person.health_status(),
            recommended_target_ml: person.recommended_target_ml(),
        }
    }

    /// Apply one client request. `Subscribe` and `Shutdown` are transport
    /// concerns and are answered by the caller.
    pub fn handle_request(&mut self, request: Request) -> Response {
        let result = self.apply(request);
        self.dispatch_events();
        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Rejected request");
                Response::Error(e.to_string())
            }
        }
    }

    fn apply(&mut self, request: Request) -> Result<Response, ValidationError> {
        let water = &mut self.user.water;
        match request {
            Request::Status => return Ok(Response::Status(Box::new(self.status()))),
            Request::Drink { ml } => {
                let ml = ml.unwrap_or(water.glass_size());
                if ml <= 0 {
                    return Err(ValidationError::NonPositiveDrink(ml));
                }
                water.add_amount(ml)?;
            }
            Request::SetAmount(v) => water.set_amount(v),
            Request::SetTarget(v) => water.set_target(v)?,
            Request::SetGlassSize(v) => water.set_glass_size(v)?,
            Request::SetReminderInterval(v) => water.set_reminder_interval(v)?,
            Request::SetReminderDelay(v) => water.set_reminder_delay(v)?,
            Request::SetNotificationLevel(level) => self.settings.set_notification_level(level),
            Request::SetColorTheme(theme) => self.settings.set_color_theme(theme),
            Request::SetSystemTheme(theme) => self.settings.system_theme_changed(theme),
            Request::SetBody {
                gender,
                age,
                weight,
                height,
            } => {
                let person = &mut self.user.person;
                if let Some(gender) = gender {
                    person.set_gender(gender);
                }
                if let Some(age) = age {
                    person.set_age(age);
                }
                if let Some(weight) = weight {
                    person.set_weight(weight);
                }
                if let Some(height) = height {
                    person.set_height(height);
                }
            }
            Request::SetAutoStartup(enabled) => self.settings.try_change_auto_startup(enabled),
            Request::Toast(action) => self.handle_background(BackgroundTask::ToastAction(action)),
            Request::WatchdogTick => self.handle_background(BackgroundTask::ReminderWatchdog),
            Request::Suspend => self.suspend(),
            Request::Resume => self.resume(),
            Request::Ping => return Ok(Response::Pong),
            Request::Subscribe | Request::Shutdown => {}
        }
        Ok(Response::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::{FixedClock, local, utc};
    use crate::constants::keys;
    use crate::model::ColorTheme;
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Reschedule(bool),
        Postpone(i32),
        Check,
    }

    /// Scheduler double that records every call
    struct RecordingScheduler(Arc<Mutex<Vec<Call>>>);

    impl NotificationScheduler for RecordingScheduler {
        fn reschedule(&mut self, _policy: &ReminderPolicy, force_recompute: bool) {
            self.0.lock().unwrap().push(Call::Reschedule(force_recompute));
        }

        fn postpone(&mut self, minutes: i32) {
            self.0.lock().unwrap().push(Call::Postpone(minutes));
        }

        fn check_schedule(&mut self, _policy: &ReminderPolicy) {
            self.0.lock().unwrap().push(Call::Check);
        }

        fn next_fire(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn take_due(&mut self, _policy: &ReminderPolicy, _now: DateTime<Utc>) -> bool {
            false
        }
    }

    struct Harness {
        app: App,
        calls: Arc<Mutex<Vec<Call>>>,
        clock: Arc<FixedClock>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn at(now: DateTime<Utc>) -> Self {
            let store = Arc::new(MemoryStore::new());
            let clock = Arc::new(FixedClock::at(now));
            let calls = Arc::new(Mutex::new(Vec::new()));
            let mut app = App::new(
                &Config::default(),
                store.clone(),
                clock.clone(),
                Box::new(RecordingScheduler(calls.clone())),
                None,
                AppTheme::Light,
            );
            app.load();
            calls.lock().unwrap().clear();
            Self {
                app,
                calls,
                clock,
                store,
            }
        }

        fn calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[test]
    fn test_load_requests_reschedule() {
        let store = Arc::new(MemoryStore::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(
            &Config::default(),
            store,
            Arc::new(FixedClock::at(utc(2026, 7, 1, 8, 0))),
            Box::new(RecordingScheduler(calls.clone())),
            None,
            AppTheme::Light,
        );
        app.load();
        assert_eq!(*calls.lock().unwrap(), vec![Call::Reschedule(true)]);
    }

    #[test]
    fn test_watchdog_after_midnight_resets() {
        let mut h = Harness::at(utc(2026, 7, 1, 20, 0));
        h.app.handle_request(Request::SetAmount(1750));
        h.calls();

        h.clock.set(utc(2026, 7, 2, 0, 10));
        let mut sub = h.app.events().subscribe();
        h.app.handle_background(BackgroundTask::ReminderWatchdog);

        assert_eq!(h.app.user.water.amount(), 0);
        assert_eq!(h.calls(), vec![Call::Reschedule(true)]);
        assert_eq!(
            sub.drain(),
            vec![Event::WaterAmountChanged { delta: -1750, amount: 0 }]
        );
    }

    #[test]
    fn test_watchdog_window_is_inclusive() {
        let mut h = Harness::at(utc(2026, 7, 2, 0, 30));
        h.app.handle_background(BackgroundTask::ReminderWatchdog);
        assert_eq!(h.calls(), vec![Call::Reschedule(true)]);

        h.clock.set(utc(2026, 7, 2, 0, 31));
        h.app.handle_background(BackgroundTask::ReminderWatchdog);
        assert_eq!(h.calls(), vec![Call::Check]);
    }

    #[test]
    fn test_watchdog_daytime_only_checks() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetAmount(500));
        h.calls();

        let mut sub = h.app.events().subscribe();
        h.app.handle_background(BackgroundTask::ReminderWatchdog);

        assert_eq!(h.app.user.water.amount(), 500);
        assert_eq!(h.calls(), vec![Call::Check]);
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_toast_confirm_adds_glass() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetGlassSize(330));
        h.app.handle_request(Request::SetAmount(100));

        h.app.handle_background(BackgroundTask::ToastAction(ToastAction::Confirm));
        assert_eq!(h.app.user.water.amount(), 430);
    }

    #[test]
    fn test_toast_postpone_uses_delay() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetReminderDelay(12));
        h.calls();

        h.app.handle_request(Request::Toast(ToastAction::Postpone));
        assert_eq!(h.calls(), vec![Call::Postpone(12)]);
    }

    #[test]
    fn test_interval_change_reschedules_with_recompute() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        let mut sub = h.app.events().subscribe();

        assert_eq!(h.app.user.water.reminder_interval(), 30);
        h.app.handle_request(Request::SetReminderInterval(60));

        assert_eq!(sub.drain(), vec![Event::WaterSettingsChanged { reschedule: true }]);
        assert_eq!(h.calls(), vec![Call::Reschedule(true)]);
    }

    #[test]
    fn test_notification_level_change_is_separate_signal() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        let mut sub = h.app.events().subscribe();

        h.app.handle_request(Request::SetNotificationLevel(NotificationLevel::Disabled));

        assert_eq!(
            sub.drain(),
            vec![Event::NotificationsSettingChanged {
                level: NotificationLevel::Disabled
            }]
        );
        assert_eq!(h.calls(), vec![Call::Reschedule(false)]);
    }

    #[test]
    fn test_target_change_does_not_recompute() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetTarget(3000));
        assert_eq!(h.calls(), vec![Call::Reschedule(false)]);
    }

    #[test]
    fn test_invalid_request_reports_error() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        let response = h.app.handle_request(Request::SetTarget(0));
        assert!(matches!(response, Response::Error(msg) if msg.contains("Target")));
        assert_eq!(h.app.user.water.target(), 2000);
        assert!(h.calls().is_empty());

        let response = h.app.handle_request(Request::Drink { ml: Some(-200) });
        assert!(matches!(response, Response::Error(_)));
    }

    #[test]
    fn test_drink_defaults_to_glass() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::Drink { ml: None });
        h.app.handle_request(Request::Drink { ml: Some(100) });
        assert_eq!(h.app.user.water.amount(), 350);
    }

    #[test]
    fn test_status_snapshot() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetBody {
            gender: None,
            age: Some(30),
            weight: Some(80.0),
            height: Some(2.0),
        });
        h.app.handle_request(Request::SetColorTheme(ColorTheme::Dark));

        let Response::Status(status) = h.app.handle_request(Request::Status) else {
            panic!("expected status");
        };
        assert_eq!(status.bmi, 20.0);
        assert_eq!(status.recommended_target_ml, 2500);
        assert_eq!(status.applied_theme, AppTheme::Dark);
        assert_eq!(status.target_ml, 2000);
        assert!(!status.can_toggle_auto_startup);
    }

    #[test]
    fn test_resume_rolls_over_stale_day() {
        let mut h = Harness::at(utc(2026, 7, 1, 22, 0));
        h.app.handle_request(Request::SetAmount(2100));
        h.calls();

        h.clock.set(utc(2026, 7, 2, 7, 0));
        h.app.resume();
        assert_eq!(h.app.user.water.amount(), 0);
        assert_eq!(h.store.raw(keys::WATER).unwrap()["Amount"], serde_json::json!(0));
        assert_eq!(h.calls(), vec![Call::Reschedule(true)]);

        h.app.resume();
        assert_eq!(h.calls(), vec![Call::Check]);
    }

    #[test]
    fn test_suspend_flushes_settings() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.suspend();
        assert_eq!(h.store.raw(keys::COLOR_THEME), Some(serde_json::json!(2)));
        assert_eq!(h.store.raw(keys::NOTIFICATIONS_LEVEL), Some(serde_json::json!(1)));
    }

    #[test]
    fn test_drink_overflow_is_rejected() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetAmount(i32::MAX));

        let response = h.app.handle_request(Request::Drink { ml: None });
        assert!(matches!(response, Response::Error(msg) if msg.contains("exceeds")));
        assert_eq!(h.app.user.water.amount(), i32::MAX);

        h.app.handle_background(BackgroundTask::ToastAction(ToastAction::Confirm));
        assert_eq!(h.app.user.water.amount(), i32::MAX);
    }

    #[test]
    fn test_amount_swing_to_minimum_is_accepted() {
        let mut h = Harness::at(utc(2026, 7, 1, 10, 0));
        h.app.handle_request(Request::SetAmount(100));
        let mut sub = h.app.events().subscribe();

        assert_eq!(h.app.handle_request(Request::SetAmount(i32::MIN)), Response::Ready);
        assert_eq!(
            sub.drain(),
            vec![Event::WaterAmountChanged { delta: i32::MIN, amount: i32::MIN }]
        );
    }

    #[test]
    fn test_negative_window_in_config_does_not_reset_daytime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rollover_window_minutes = -30\n").unwrap();
        let config = Config::load_from(&path).unwrap();

        let clock = Arc::new(FixedClock::at(utc(2026, 7, 1, 9, 0)));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(
            &config,
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Box::new(RecordingScheduler(calls.clone())),
            None,
            AppTheme::Light,
        );
        app.load();
        app.handle_request(Request::SetAmount(1500));
        calls.lock().unwrap().clear();

        clock.set(utc(2026, 7, 1, 10, 0));
        app.handle_background(BackgroundTask::ReminderWatchdog);
        assert_eq!(app.user.water.amount(), 1500);
        assert_eq!(*calls.lock().unwrap(), vec![Call::Check]);
    }

    #[test]
    fn test_watchdog_window_follows_local_midnight() {
        let config = Config {
            day_boundary: DayBoundary::Local,
            ..Config::default()
        };
        let clock = Arc::new(FixedClock::at(local(2026, 7, 14, 9, 0)));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut app = App::new(
            &config,
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Box::new(RecordingScheduler(calls.clone())),
            None,
            AppTheme::Light,
        );
        app.load();
        app.handle_request(Request::SetAmount(1500));
        calls.lock().unwrap().clear();

        clock.set(local(2026, 7, 14, 10, 0));
        app.handle_background(BackgroundTask::ReminderWatchdog);
        assert_eq!(app.user.water.amount(), 1500);
        assert_eq!(std::mem::take(&mut *calls.lock().unwrap()), vec![Call::Check]);

        clock.set(local(2026, 7, 15, 0, 10));
        app.handle_background(BackgroundTask::ReminderWatchdog);
        assert_eq!(app.user.water.amount(), 0);
        assert_eq!(*calls.lock().unwrap(), vec![Call::Reschedule(true)]);
    }
}
