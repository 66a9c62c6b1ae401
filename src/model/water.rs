//! Daily water intake and reminder preferences
//!
//! The intake counter belongs to one calendar day: loading a record written on
//! an earlier day zeroes the counter but keeps every preference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, DayBoundary};
use crate::constants::{keys, water};
use crate::error::{StoreError, ValidationError};
use crate::events::{Event, EventBus};
use crate::store::{self, KeyValueStore};

/// Persisted shape of the `"Water"` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WaterRecord {
    reminder_interval: i32,
    reminder_delay: i32,
    glass_size: i32,
    target: i32,
    amount: i32,
    timestamp: DateTime<Utc>,
}

impl WaterRecord {
    /// Preferences outside their setter ranges mean the record was not written by us
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check("ReminderInterval", "minutes", self.reminder_interval, water::REMINDER_INTERVAL_RANGE)?;
        ValidationError::check("ReminderDelay", "minutes", self.reminder_delay, water::REMINDER_DELAY_RANGE)?;
        ValidationError::check("GlassSize", "mL", self.glass_size, water::GLASS_SIZE_RANGE)?;
        ValidationError::check("Target", "mL", self.target, water::TARGET_RANGE)?;
        Ok(())
    }
}

pub struct WaterState {
    amount: i32,
    target: i32,
    glass_size: i32,
    reminder_interval: i32,
    reminder_delay: i32,
    last_updated: DateTime<Utc>,

    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    day: DayBoundary,
    events: EventBus,
}

impl WaterState {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        day: DayBoundary,
        events: EventBus,
    ) -> Self {
        let now = clock.now();
        Self {
            amount: water::DEFAULT_AMOUNT,
            target: water::DEFAULT_TARGET,
            glass_size: water::DEFAULT_GLASS_SIZE,
            reminder_interval: water::DEFAULT_REMINDER_INTERVAL,
            reminder_delay: water::DEFAULT_REMINDER_DELAY,
            last_updated: now,
            store,
            clock,
            day,
            events,
        }
    }

    pub fn amount(&self) -> i32 {
        self.amount
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn glass_size(&self) -> i32 {
        self.glass_size
    }

    pub fn reminder_interval(&self) -> i32 {
        self.reminder_interval
    }

    pub fn reminder_delay(&self) -> i32 {
        self.reminder_delay
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Record the total drunk today. Not range-checked.
    pub fn set_amount(&mut self, value: i32) {
        let delta = value.saturating_sub(self.amount);
        self.amount = value;
        self.save();

        debug!(amount = value, delta = delta, "Water amount updated");
        self.events.publish(Event::WaterAmountChanged {
            delta,
            amount: self.amount,
        });
    }

    /// Add a drink to today's total. Fails if the total would overflow.
    pub fn add_amount(&mut self, ml: i32) -> Result<(), ValidationError> {
        let total = self
            .amount
            .checked_add(ml)
            .ok_or(ValidationError::AmountOverflow { amount: self.amount, added: ml })?;
        self.set_amount(total);
        Ok(())
    }

    pub fn set_target(&mut self, value: i32) -> Result<(), ValidationError> {
        self.target = ValidationError::check("Target", "mL", value, water::TARGET_RANGE)?;
        self.save();
        self.events.publish(Event::WaterSettingsChanged { reschedule: false });
        Ok(())
    }

    pub fn set_glass_size(&mut self, value: i32) -> Result<(), ValidationError> {
        self.glass_size = ValidationError::check("GlassSize", "mL", value, water::GLASS_SIZE_RANGE)?;
        self.save();
        self.events.publish(Event::WaterSettingsChanged { reschedule: false });
        Ok(())
    }

    pub fn set_reminder_interval(&mut self, value: i32) -> Result<(), ValidationError> {
        self.reminder_interval = ValidationError::check(
            "ReminderInterval",
            "minutes",
            value,
            water::REMINDER_INTERVAL_RANGE,
        )?;
        self.save();
        self.events.publish(Event::WaterSettingsChanged { reschedule: true });
        Ok(())
    }

    pub fn set_reminder_delay(&mut self, value: i32) -> Result<(), ValidationError> {
        self.reminder_delay = ValidationError::check(
            "ReminderDelay",
            "minutes",
            value,
            water::REMINDER_DELAY_RANGE,
        )?;
        self.save();
        self.events.publish(Event::WaterSettingsChanged { reschedule: true });
        Ok(())
    }

    /// Load the stored record, zeroing the counter if it belongs to a previous day.
    /// A missing or unusable record is replaced by defaults, which are written back.
    pub fn load(&mut self) {
        match self.read_record() {
            Ok(record) => {
                self.reminder_interval = record.reminder_interval;
                self.reminder_delay = record.reminder_delay;
                self.glass_size = record.glass_size;
                self.target = record.target;
                self.amount = record.amount;
                self.last_updated = record.timestamp;
                info!(
                    amount = self.amount,
                    target = self.target,
                    last_updated = %self.last_updated,
                    "Loaded water record"
                );
                self.roll_over_if_stale();
            }
            Err(e) => {
                warn!(error = %e, "Water record unavailable, using defaults");
                self.reminder_interval = water::DEFAULT_REMINDER_INTERVAL;
                self.reminder_delay = water::DEFAULT_REMINDER_DELAY;
                self.glass_size = water::DEFAULT_GLASS_SIZE;
                self.amount = water::DEFAULT_AMOUNT;
                self.target = water::DEFAULT_TARGET;
                self.save();
            }
        }

        self.events.publish(Event::WaterAmountChanged {
            delta: self.amount,
            amount: self.amount,
        });
        self.events.publish(Event::WaterSettingsChanged { reschedule: true });
    }

    /// Whether `last_updated` lies on an earlier day than now
    pub fn is_stale(&self) -> bool {
        self.day.is_previous_day(self.last_updated, self.clock.now())
    }

    /// Zero the counter if it belongs to an earlier day. Returns whether it did.
    fn roll_over_if_stale(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        let now = self.clock.now();

        info!(
            previous_amount = self.amount,
            last_updated = %self.last_updated,
            "New day, resetting water amount"
        );
        self.amount = water::DEFAULT_AMOUNT;
        self.last_updated = now;
        true
    }

    /// Stamp `last_updated` and write the record. Failures are logged only.
    pub fn save(&mut self) {
        self.last_updated = self.clock.now();

        let record = WaterRecord {
            reminder_interval: self.reminder_interval,
            reminder_delay: self.reminder_delay,
            glass_size: self.glass_size,
            target: self.target,
            amount: self.amount,
            timestamp: self.last_updated,
        };
        if let Err(e) = store::set_record(self.store.as_ref(), keys::WATER, &record) {
            error!(error = %e, "Failed to save water record");
        }
    }

    fn read_record(&self) -> Result<WaterRecord, StoreError> {
        let record: WaterRecord = store::get_record(self.store.as_ref(), keys::WATER)?
            .ok_or_else(|| StoreError::Corrupt {
                key: keys::WATER.to_string(),
                reason: "record missing".to_string(),
            })?;
        record.validate().map_err(|e| StoreError::Corrupt {
            key: keys::WATER.to_string(),
            reason: e.to_string(),
        })?;
        Ok(record)
    }
}
