//! Drink reminder scheduling
//!
//! The scheduler only decides *when* the next reminder is due. Delivering it
//! is left to whoever polls [`NotificationScheduler::take_due`].

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::model::NotificationLevel;

/// Snapshot of the inputs that drive reminder timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub level: NotificationLevel,
    pub interval_minutes: i32,
    pub delay_minutes: i32,
}

impl ReminderPolicy {
    pub fn enabled(&self) -> bool {
        self.level != NotificationLevel::Disabled
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }
}

pub trait NotificationScheduler: Send {
    /// Re-evaluate after a settings change. With `force_recompute` the next fire
    /// time restarts from now; without it only enabled/disabled is re-checked.
    fn reschedule(&mut self, policy: &ReminderPolicy, force_recompute: bool);

    /// Push the next reminder out to `minutes` from now
    fn postpone(&mut self, minutes: i32);

    /// Make sure a reminder is armed if it should be. Idempotent.
    fn check_schedule(&mut self, policy: &ReminderPolicy);

    fn next_fire(&self) -> Option<DateTime<Utc>>;

    /// If a reminder is due at `now`, re-arm it one interval later and return true
    fn take_due(&mut self, policy: &ReminderPolicy, now: DateTime<Utc>) -> bool;
}

pub struct ReminderScheduler {
    next_fire: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_fire: None,
            clock,
        }
    }

    fn arm(&mut self, at: DateTime<Utc>) {
        debug!(next_fire = %at, "Reminder armed");
        self.next_fire = Some(at);
    }
}

impl NotificationScheduler for ReminderScheduler {
    fn reschedule(&mut self, policy: &ReminderPolicy, force_recompute: bool) {
        if !policy.enabled() {
            if self.next_fire.take().is_some() {
                info!("Reminders disabled, cleared pending reminder");
            }
            return;
        }

        if force_recompute || self.next_fire.is_none() {
            let now = self.clock.now();
            self.arm(now + policy.interval());
        }
    }

    fn postpone(&mut self, minutes: i32) {
        if self.next_fire.is_none() {
            debug!("Nothing to postpone");
            return;
        }
        let at = self.clock.now() + Duration::minutes(i64::from(minutes));
        info!(minutes = minutes, next_fire = %at, "Reminder postponed");
        self.next_fire = Some(at);
    }

    fn check_schedule(&mut self, policy: &ReminderPolicy) {
        if !policy.enabled() {
            self.next_fire = None;
            return;
        }

        let now = self.clock.now();
        match self.next_fire {
            None => self.arm(now + policy.interval()),
            // Missed by more than a whole interval (e.g. machine was asleep)
            Some(at) if at + policy.interval() < now => {
                info!(missed = %at, "Reminder schedule stale, re-arming");
                self.arm(now + policy.interval());
            }
            Some(_) => {}
        }
    }

    fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next_fire
    }

    fn take_due(&mut self, policy: &ReminderPolicy, now: DateTime<Utc>) -> bool {
        match self.next_fire {
            Some(at) if policy.enabled() && at <= now => {
                self.arm(now + policy.interval());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::{FixedClock, utc};

    fn policy(level: NotificationLevel, interval: i32) -> ReminderPolicy {
        ReminderPolicy {
            level,
            interval_minutes: interval,
            delay_minutes: 5,
        }
    }

    fn scheduler() -> (ReminderScheduler, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at(utc(2026, 6, 1, 9, 0)));
        (ReminderScheduler::new(clock.clone()), clock)
    }

    #[test]
    fn test_force_recompute_moves_fire_time() {
        let (mut s, clock) = scheduler();
        let p = policy(NotificationLevel::Standard, 30);
        s.reschedule(&p, true);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 9, 30)));

        clock.set(utc(2026, 6, 1, 9, 10));
        s.reschedule(&policy(NotificationLevel::Standard, 60), true);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 10, 10)));
    }

    #[test]
    fn test_toggle_keeps_fire_time() {
        let (mut s, clock) = scheduler();
        s.reschedule(&policy(NotificationLevel::Standard, 30), true);

        clock.set(utc(2026, 6, 1, 9, 10));
        s.reschedule(&policy(NotificationLevel::Alarm, 30), false);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 9, 30)));
    }

    #[test]
    fn test_disable_clears_and_enable_rearms() {
        let (mut s, _) = scheduler();
        s.reschedule(&policy(NotificationLevel::Standard, 30), true);
        s.reschedule(&policy(NotificationLevel::Disabled, 30), false);
        assert_eq!(s.next_fire(), None);

        s.reschedule(&policy(NotificationLevel::Standard, 30), false);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 9, 30)));
    }

    #[test]
    fn test_postpone() {
        let (mut s, clock) = scheduler();
        s.postpone(5);
        assert_eq!(s.next_fire(), None);

        s.reschedule(&policy(NotificationLevel::Standard, 30), true);
        clock.set(utc(2026, 6, 1, 9, 30));
        s.postpone(5);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 9, 35)));
    }

    #[test]
    fn test_check_schedule_is_idempotent() {
        let (mut s, clock) = scheduler();
        let p = policy(NotificationLevel::Standard, 30);
        s.check_schedule(&p);
        let armed = s.next_fire();
        assert_eq!(armed, Some(utc(2026, 6, 1, 9, 30)));

        clock.set(utc(2026, 6, 1, 9, 20));
        s.check_schedule(&p);
        s.check_schedule(&p);
        assert_eq!(s.next_fire(), armed);
    }

    #[test]
    fn test_check_schedule_rearms_stale() {
        let (mut s, clock) = scheduler();
        let p = policy(NotificationLevel::Standard, 30);
        s.reschedule(&p, true);

        clock.set(utc(2026, 6, 1, 14, 0));
        s.check_schedule(&p);
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 14, 30)));
    }

    #[test]
    fn test_take_due() {
        let (mut s, _) = scheduler();
        let p = policy(NotificationLevel::Standard, 30);
        s.reschedule(&p, true);

        assert!(!s.take_due(&p, utc(2026, 6, 1, 9, 29)));
        assert!(s.take_due(&p, utc(2026, 6, 1, 9, 31)));
        assert_eq!(s.next_fire(), Some(utc(2026, 6, 1, 10, 1)));
        assert!(!s.take_due(&p, utc(2026, 6, 1, 9, 32)));
    }
}
