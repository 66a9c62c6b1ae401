//! Body information entered in the BMI calculator

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::constants::{bmi, keys};
use crate::error::StoreError;
use crate::events::{Event, EventBus};
use crate::store::{self, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Gender {
    Male,
    Female,
}

impl From<Gender> for i32 {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

impl TryFrom<i32> for Gender {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Gender::Male),
            1 => Ok(Gender::Female),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Height not entered yet
    Undefined,
    Underweight,
    Healthy,
    Overweight,
    Obese,
    ExtremelyObese,
}

impl HealthStatus {
    pub fn from_bmi(index: f32) -> Self {
        if index == 0.0 {
            HealthStatus::Undefined
        } else if index < bmi::UNDERWEIGHT_BELOW {
            HealthStatus::Underweight
        } else if index < bmi::HEALTHY_BELOW {
            HealthStatus::Healthy
        } else if index < bmi::OVERWEIGHT_BELOW {
            HealthStatus::Overweight
        } else if index < bmi::OBESE_BELOW {
            HealthStatus::Obese
        } else {
            HealthStatus::ExtremelyObese
        }
    }
}

/// Persisted shape of the `"BodyInformation"` record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BodyRecord {
    gender: i32,
    age: u32,
    weight: f32,
    height: f32,
}

pub struct PersonState {
    gender: Gender,
    age: u32,
    weight: f32,
    height: f32,

    store: Arc<dyn KeyValueStore>,
    events: EventBus,
}

impl PersonState {
    pub fn new(store: Arc<dyn KeyValueStore>, events: EventBus) -> Self {
        Self {
            gender: Gender::Male,
            age: 0,
            weight: 0.0,
            height: 0.0,
            store,
            events,
        }
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// Body weight in kg
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Height in metres
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.gender = gender;
        self.save();
    }

    pub fn set_age(&mut self, age: u32) {
        self.age = age;
        self.save();
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
        self.save();
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height;
        self.save();
    }

    /// weight / height², or 0 while no height is set
    pub fn body_mass_index(&self) -> f32 {
        if self.height > 0.0 {
            self.weight / (self.height * self.height)
        } else {
            0.0
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_bmi(self.body_mass_index())
    }

    /// Suggested daily intake in mL by age and gender
    pub fn recommended_target_ml(&self) -> i32 {
        match self.age {
            0..=3 => 1200,
            4..=6 => 1600,
            7..=10 => 1800,
            11..=14 => match self.gender {
                Gender::Male => 2100,
                Gender::Female => 1900,
            },
            _ => match self.gender {
                Gender::Male => 2500,
                Gender::Female => 2000,
            },
        }
    }

    /// Load body information; missing or unusable data is replaced by defaults and written back
    pub fn load(&mut self) {
        match self.read_record() {
            Ok((gender, record)) => {
                self.gender = gender;
                self.age = record.age;
                self.weight = record.weight;
                self.height = record.height;
                info!(age = self.age, bmi = self.body_mass_index(), "Loaded body information");
                self.events.publish(Event::PersonChanged);
            }
            Err(e) => {
                warn!(error = %e, "Body information unavailable, using defaults");
                self.gender = Gender::Male;
                self.age = 0;
                self.weight = 0.0;
                self.height = 0.0;
                self.save();
            }
        }
    }

    /// Write body information and notify listeners. Failures are logged only.
    pub fn save(&mut self) {
        let record = BodyRecord {
            gender: self.gender.into(),
            age: self.age,
            weight: self.weight,
            height: self.height,
        };
        match store::set_record(self.store.as_ref(), keys::BODY_INFORMATION, &record) {
            Ok(()) => self.events.publish(Event::PersonChanged),
            Err(e) => error!(error = %e, "Failed to save body information"),
        }
    }

    fn read_record(&self) -> Result<(Gender, BodyRecord), StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            key: keys::BODY_INFORMATION.to_string(),
            reason,
        };
        let record: BodyRecord = store::get_record(self.store.as_ref(), keys::BODY_INFORMATION)?
            .ok_or_else(|| corrupt("record missing".to_string()))?;
        let gender = Gender::try_from(record.gender)
            .map_err(|v| corrupt(format!("unknown gender {v}")))?;
        Ok((gender, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn person() -> (PersonState, Arc<MemoryStore>, EventBus) {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new();
        (PersonState::new(store.clone(), events.clone()), store, events)
    }

    #[test]
    fn test_bmi_boundary_is_healthy() {
        let (mut p, _, _) = person();
        p.set_height(1.8);
        p.set_weight(59.94);
        let index = p.body_mass_index();
        assert!((index - 18.5).abs() < 0.01, "bmi={index}");

        assert_eq!(HealthStatus::from_bmi(18.5), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_bmi(18.49), HealthStatus::Underweight);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(HealthStatus::from_bmi(24.99), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_bmi(25.0), HealthStatus::Overweight);
        assert_eq!(HealthStatus::from_bmi(30.0), HealthStatus::Obese);
        assert_eq!(HealthStatus::from_bmi(39.99), HealthStatus::Obese);
        assert_eq!(HealthStatus::from_bmi(40.0), HealthStatus::ExtremelyObese);
    }

    #[test]
    fn test_zero_height_is_undefined() {
        let (mut p, _, _) = person();
        p.set_weight(80.0);
        p.set_height(0.0);
        assert_eq!(p.body_mass_index(), 0.0);
        assert_eq!(p.health_status(), HealthStatus::Undefined);

        p.set_height(-1.7);
        assert_eq!(p.health_status(), HealthStatus::Undefined);
    }

    #[test]
    fn test_bmi_recomputed_on_read() {
        let (mut p, _, _) = person();
        p.set_height(2.0);
        p.set_weight(80.0);
        assert_eq!(p.body_mass_index(), 20.0);
        p.set_weight(120.0);
        assert_eq!(p.body_mass_index(), 30.0);
        assert_eq!(p.health_status(), HealthStatus::Obese);
    }

    #[test]
    fn test_only_raw_inputs_persisted() {
        let (mut p, store, _) = person();
        p.set_gender(Gender::Female);
        p.set_age(34);
        p.set_weight(61.5);
        p.set_height(1.68);

        let stored = store.raw(keys::BODY_INFORMATION).unwrap();
        assert_eq!(stored["Gender"], json!(1));
        assert_eq!(stored["Age"], json!(34));
        assert_eq!(stored.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_load_round_trip() {
        let (mut p, store, events) = person();
        p.set_gender(Gender::Female);
        p.set_age(12);
        p.set_height(1.5);

        let mut sub = events.subscribe();
        let mut reloaded = PersonState::new(store, events.clone());
        reloaded.load();
        assert_eq!(reloaded.gender(), Gender::Female);
        assert_eq!(reloaded.age(), 12);
        assert_eq!(reloaded.height(), 1.5);
        assert_eq!(sub.drain(), vec![Event::PersonChanged]);
    }

    #[test]
    fn test_load_missing_writes_defaults() {
        let (mut p, store, _) = person();
        p.load();
        assert_eq!(p.gender(), Gender::Male);
        assert_eq!(p.health_status(), HealthStatus::Undefined);
        assert!(store.raw(keys::BODY_INFORMATION).is_some());
    }

    #[test]
    fn test_load_unknown_gender_uses_defaults() {
        let (mut p, store, _) = person();
        store.put_raw(
            keys::BODY_INFORMATION,
            json!({ "Gender": 7, "Age": 40, "Weight": 70.0, "Height": 1.75 }),
        );
        p.load();
        assert_eq!(p.age(), 0);
    }

    #[test]
    fn test_recommended_target() {
        let (mut p, _, _) = person();
        p.set_age(2);
        assert_eq!(p.recommended_target_ml(), 1200);
        p.set_age(13);
        p.set_gender(Gender::Female);
        assert_eq!(p.recommended_target_ml(), 1900);
        p.set_age(30);
        assert_eq!(p.recommended_target_ml(), 2000);
        p.set_gender(Gender::Male);
        assert_eq!(p.recommended_target_ml(), 2500);
    }
}
