//! Sensor entities for a CellarTracker cellar
//!
//! Every refresh of the coordinator is turned into entity states:
//!
//! - one sensor per wine group, whose state is the wine name
//! - one sensor per bottle
//! - the total bottle count and the total cellar value
//!
//! States live in a [`StateStore`]; the [`SensorPlatform`] registers new
//! sensors as wines appear and marks them unavailable when they vanish.

mod entity_id;
mod platform;
mod sensor;
mod state;
mod store;

pub use entity_id::{slugify, strip_size_suffix, EntityId, EntityIdError};
pub use platform::{RegisteredSensor, SensorPlatform, SyncReport};
pub use sensor::{
    Sensor, ICON_BOTTLE, ICON_COUNTER, ICON_CURRENCY, ICON_WINE, SENSOR_DOMAIN, UNIT_BOTTLES,
};
pub use state::{Attributes, SensorState, SensorValue, STATE_UNAVAILABLE, STATE_UNKNOWN};
pub use store::{SharedStateStore, StateChanged, StateStore};
