//! Sensor kinds and how each renders a snapshot

use cellar_coordinator::Snapshot;
use cellar_core::{fields, AnnotatedBottle, WineGroup, DOMAIN};
use serde_json::{json, Value};

use crate::entity_id::{slugify, strip_size_suffix};
use crate::state::{Attributes, SensorValue, STATE_UNKNOWN};
use crate::{EntityId, EntityIdError};

/// Entity domain of every sensor
pub const SENSOR_DOMAIN: &str = "sensor";

pub const ICON_WINE: &str = "mdi:bottle-wine";
pub const ICON_BOTTLE: &str = "mdi:bottle-wine-outline";
pub const ICON_COUNTER: &str = "mdi:counter";
pub const ICON_CURRENCY: &str = "mdi:currency-eur";

pub const UNIT_BOTTLES: &str = "bottles";

/// Slug used when a key has no letters or digits
const EMPTY_SLUG: &str = "unnamed";

/// One sensor entity derived from the inventory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// One wine group, by wine key
    Wine { key: String },
    /// One physical bottle
    Bottle { unique_bottle_id: String },
    TotalBottles,
    /// Cellar value, reported in `currency`
    TotalValue { currency: String },
}

impl Sensor {
    /// Unique id, e.g. `cellar_tracker.wine.2015_margaux`
    ///
    /// Wine keys differing only in their size suffix share a unique id;
    /// the platform disambiguates those.
    pub fn unique_id(&self) -> String {
        match self {
            Sensor::Wine { key } => format!("{DOMAIN}.wine.{}", wine_slug(key)),
            Sensor::Bottle { unique_bottle_id } => {
                format!("{DOMAIN}.bottle.{}", slug_or_unnamed(unique_bottle_id))
            }
            Sensor::TotalBottles => format!("{DOMAIN}.total_bottles"),
            Sensor::TotalValue { .. } => format!("{DOMAIN}.total_value"),
        }
    }

    /// Entity id derived from the unique id, e.g. `sensor.cellar_tracker_wine_2015_margaux`
    pub fn entity_id(&self) -> Result<EntityId, EntityIdError> {
        EntityId::new(SENSOR_DOMAIN, self.unique_id().replace('.', "_"))
    }

    /// The value this sensor reports for `snapshot`
    ///
    /// A wine or bottle that is no longer in the snapshot renders as
    /// unavailable.
    pub fn render(&self, snapshot: &Snapshot) -> SensorValue {
        let aggregation = &snapshot.aggregation;
        match self {
            Sensor::Wine { key } => match aggregation.group(key) {
                Some(group) => wine_value(group),
                None => SensorValue::unavailable().with_icon(ICON_WINE),
            },
            Sensor::Bottle { unique_bottle_id } => match aggregation.bottle(unique_bottle_id) {
                Some(bottle) => bottle_value(bottle),
                None => SensorValue::unavailable().with_icon(ICON_BOTTLE),
            },
            Sensor::TotalBottles => {
                SensorValue::new(aggregation.totals.total_bottles.to_string())
                    .with_unit(UNIT_BOTTLES)
                    .with_icon(ICON_COUNTER)
            }
            Sensor::TotalValue { currency } => {
                SensorValue::new(format!("{:.2}", aggregation.totals.total_value))
                    .with_unit(currency.as_str())
                    .with_icon(ICON_CURRENCY)
            }
        }
    }
}

fn wine_slug(key: &str) -> String {
    slug_or_unnamed(strip_size_suffix(key))
}

fn slug_or_unnamed(value: &str) -> String {
    let slug = slugify(value);
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

fn non_empty_or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        STATE_UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// State is the wine name; attributes are the group without it
fn wine_value(group: &WineGroup) -> SensorValue {
    let mut attributes = Attributes::new();
    attributes.insert("count".into(), json!(group.count));
    attributes.insert("value_total".into(), json!(group.value_total));
    attributes.insert("value_avg".into(), json!(group.value_avg));
    attributes.insert("%".into(), json!(group.percentage));
    attributes.insert("vintage".into(), json!(group.vintage));
    attributes.insert("varietal".into(), json!(group.varietal));
    attributes.insert("producer".into(), json!(group.producer));
    attributes.insert("type".into(), json!(group.wine_type));
    attributes.insert("appellation".into(), json!(group.appellation));
    attributes.insert("country".into(), json!(group.country));
    attributes.insert("region".into(), json!(group.region));
    attributes.insert("location".into(), json!(group.location));
    attributes.insert("store".into(), json!(group.store));
    attributes.insert("size".into(), json!(group.size));
    attributes.insert("beginconsume".into(), json!(group.begin_consume));
    attributes.insert("endconsume".into(), json!(group.end_consume));
    attributes.insert("bins".into(), json!(group.bins));

    SensorValue::new(non_empty_or_unknown(&group.wine))
        .with_attributes(attributes)
        .with_icon(ICON_WINE)
}

/// State is the wine name; attributes are the raw record plus parsed amounts
fn bottle_value(bottle: &AnnotatedBottle) -> SensorValue {
    let mut attributes: Attributes = bottle.record.fields().clone();
    attributes.insert(
        "unique_bottle_id".into(),
        Value::String(bottle.unique_bottle_id.clone()),
    );
    attributes.insert("valuation".into(), json!(bottle.valuation));
    attributes.insert(
        "price".into(),
        bottle.price.map_or(Value::Null, |price| json!(price)),
    );

    SensorValue::new(non_empty_or_unknown(&bottle.record.text(fields::WINE)))
        .with_attributes(attributes)
        .with_icon(ICON_BOTTLE)
}
