//! Per-user data loaded and saved together

use std::sync::Arc;

use crate::clock::{Clock, DayBoundary};
use crate::events::EventBus;
use crate::store::KeyValueStore;

use super::{PersonState, WaterState};

pub struct UserData {
    pub person: PersonState,
    pub water: WaterState,
}

impl UserData {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        day: DayBoundary,
        events: EventBus,
    ) -> Self {
        Self {
            person: PersonState::new(store.clone(), events.clone()),
            water: WaterState::new(store, clock, day, events),
        }
    }

    pub fn load(&mut self) {
        self.person.load();
        self.water.load();
    }

    pub fn save(&mut self) {
        self.person.save();
        self.water.save();
    }
}
