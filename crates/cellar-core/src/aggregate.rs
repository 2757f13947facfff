//! Inventory aggregation
//!
//! Turns the flat bottle list into wine groups, annotated bottles and
//! cellar totals. The aggregation is a pure function of its input: running
//! it twice on the same records in the same order gives identical output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bottle_id::{base_bottle_id, BottleIdAllocator};
use crate::record::{fields, BottleRecord};

/// How the grouping key for a wine is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WineKeyStyle {
    /// `"{Vintage} {Wine}"`
    #[default]
    VintageWine,
    /// `"{Vintage} {Wine} ({Size})"`
    VintageWineSize,
}

/// Key style used when none is configured
pub const DEFAULT_WINE_KEY_STYLE: WineKeyStyle = WineKeyStyle::VintageWine;

/// Aggregate statistics for all bottles sharing one wine key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineGroup {
    pub count: usize,
    pub value_total: f64,
    pub value_avg: f64,
    /// Share of the total cellar value, in percent
    pub percentage: f64,
    pub vintage: String,
    pub wine: String,
    pub varietal: String,
    pub producer: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    pub appellation: String,
    pub country: String,
    pub region: String,
    pub location: String,
    pub store: String,
    pub size: String,
    #[serde(rename = "beginconsume")]
    pub begin_consume: String,
    #[serde(rename = "endconsume")]
    pub end_consume: String,
    /// Non-empty bins of all members, in input order
    pub bins: Vec<String>,
}

/// An inventory record with its derived identifier and parsed amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedBottle {
    pub unique_bottle_id: String,
    pub valuation: f64,
    /// `None` when the upstream price is not a number
    pub price: Option<f64>,
    #[serde(flatten)]
    pub record: BottleRecord,
}

/// Cellar-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellarTotals {
    pub total_bottles: usize,
    /// Sum of all valuations, rounded to 2 decimals
    pub total_value: f64,
}

/// Result of one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub groups: IndexMap<String, WineGroup>,
    /// Bottles by unique id, in input order
    pub bottles: IndexMap<String, AnnotatedBottle>,
    pub totals: CellarTotals,
}

impl Aggregation {
    /// An aggregation over an empty inventory
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a wine group by key
    pub fn group(&self, key: &str) -> Option<&WineGroup> {
        self.groups.get(key)
    }

    /// Look up a bottle by its unique id
    pub fn bottle(&self, unique_bottle_id: &str) -> Option<&AnnotatedBottle> {
        self.bottles.get(unique_bottle_id)
    }

    pub fn is_empty(&self) -> bool {
        self.bottles.is_empty()
    }
}

/// Groups raw bottle records into wine-level aggregates
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryAggregator {
    key_style: WineKeyStyle,
}

impl InventoryAggregator {
    /// Create an aggregator using the given key style
    pub fn new(key_style: WineKeyStyle) -> Self {
        Self { key_style }
    }

    pub fn key_style(&self) -> WineKeyStyle {
        self.key_style
    }

    /// Grouping key for a record
    pub fn wine_key(&self, record: &BottleRecord) -> String {
        let vintage = record.text(fields::VINTAGE);
        let wine = record.text(fields::WINE);
        match self.key_style {
            WineKeyStyle::VintageWine => format!("{vintage} {wine}"),
            WineKeyStyle::VintageWineSize => {
                format!("{vintage} {wine} ({})", record.text(fields::SIZE))
            }
        }
    }

    /// Aggregate an inventory
    ///
    /// Records without `iWine` are skipped. Field-level parse problems never
    /// fail the run; they fall back to defaults.
    pub fn aggregate(&self, records: &[BottleRecord]) -> Aggregation {
        let mut ids = BottleIdAllocator::new();
        let mut bottles: IndexMap<String, AnnotatedBottle> =
            IndexMap::with_capacity(records.len());
        let mut members: IndexMap<String, Vec<usize>> = IndexMap::new();

        for (index, record) in records.iter().enumerate() {
            if !record.has_wine_id() {
                warn!(index, "Skipping inventory record without iWine");
                continue;
            }

            let unique_bottle_id = ids.allocate(base_bottle_id(record));
            members
                .entry(self.wine_key(record))
                .or_default()
                .push(bottles.len());
            bottles.insert(
                unique_bottle_id.clone(),
                AnnotatedBottle {
                    unique_bottle_id,
                    valuation: record.valuation(),
                    price: record.price(),
                    record: record.clone(),
                },
            );
        }

        let grand_total: f64 = bottles.values().map(|b| b.valuation).sum();

        let groups: IndexMap<String, WineGroup> = members
            .into_iter()
            .filter_map(|(key, indices)| {
                let group: Vec<&AnnotatedBottle> = indices
                    .iter()
                    .filter_map(|&i| bottles.get_index(i).map(|(_, bottle)| bottle))
                    .collect();
                summarize(&group, grand_total).map(|g| (key, g))
            })
            .collect();

        let totals = CellarTotals {
            total_bottles: groups.values().map(|g| g.count).sum(),
            total_value: round2(grand_total),
        };

        debug!(
            records = records.len(),
            bottles = bottles.len(),
            groups = groups.len(),
            total_value = totals.total_value,
            "Aggregated inventory"
        );

        Aggregation {
            groups,
            bottles,
            totals,
        }
    }
}

/// Build the group statistics; `None` only for an empty member list
fn summarize(members: &[&AnnotatedBottle], grand_total: f64) -> Option<WineGroup> {
    let first = &members.first()?.record;
    let count = members.len();
    let value_total: f64 = members.iter().map(|b| b.valuation).sum();
    let percentage = if grand_total > 0.0 {
        value_total / grand_total * 100.0
    } else {
        0.0
    };

    Some(WineGroup {
        count,
        value_total,
        value_avg: value_total / count as f64,
        percentage,
        vintage: first.text(fields::VINTAGE),
        wine: first.text(fields::WINE),
        varietal: first.text(fields::VARIETAL),
        producer: first.text(fields::PRODUCER),
        wine_type: first.text(fields::TYPE),
        appellation: first.text(fields::APPELLATION),
        country: first.text(fields::COUNTRY),
        region: first.text(fields::REGION),
        location: first.text(fields::LOCATION),
        store: first.text(fields::STORE_NAME),
        size: first.text(fields::SIZE),
        begin_consume: first.text(fields::BEGIN_CONSUME),
        end_consume: first.text(fields::END_CONSUME),
        bins: members
            .iter()
            .map(|b| b.record.text(fields::BIN))
            .filter(|bin| !bin.is_empty())
            .collect(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn margaux(valuation: &str, bin: &str) -> BottleRecord {
        BottleRecord::new()
            .with("iWine", 1)
            .with("Vintage", 2015)
            .with("Wine", "Margaux")
            .with("Valuation", valuation)
            .with("Size", "750ml")
            .with("Bin", bin)
    }

    #[test]
    fn test_groups_bottles_of_same_wine() {
        let records = vec![margaux("10,00", "A1"), margaux("20.00", "")];
        let result = InventoryAggregator::default().aggregate(&records);

        assert_eq!(result.groups.len(), 1);
        let group = result.group("2015 Margaux").unwrap();
        assert_eq!(group.count, 2);
        assert_eq!(group.value_total, 30.0);
        assert_eq!(group.value_avg, 15.0);
        assert_eq!(group.percentage, 100.0);
        assert_eq!(group.bins, vec!["A1".to_string()]);
        assert_eq!(result.totals.total_bottles, 2);
        assert_eq!(result.totals.total_value, 30.0);
    }

    #[test]
    fn test_key_with_size() {
        let aggregator = InventoryAggregator::new(WineKeyStyle::VintageWineSize);
        let result = aggregator.aggregate(&[margaux("10", "A1")]);
        assert!(result.group("2015 Margaux (750ml)").is_some());
        assert_eq!(aggregator.key_style(), WineKeyStyle::VintageWineSize);
    }

    #[test]
    fn test_descriptive_fields_from_first_member() {
        let records = vec![
            margaux("10", "A1")
                .with("Producer", "Château Margaux")
                .with("Type", "Red")
                .with("StoreName", "Vinmonopolet")
                .with("BeginConsume", "2025")
                .with("EndConsume", "2050"),
            margaux("10", "A2").with("Producer", "Someone Else"),
        ];
        let result = InventoryAggregator::default().aggregate(&records);
        let group = result.group("2015 Margaux").unwrap();
        assert_eq!(group.vintage, "2015");
        assert_eq!(group.wine, "Margaux");
        assert_eq!(group.producer, "Château Margaux");
        assert_eq!(group.wine_type, "Red");
        assert_eq!(group.store, "Vinmonopolet");
        assert_eq!(group.size, "750ml");
        assert_eq!(group.begin_consume, "2025");
        assert_eq!(group.end_consume, "2050");
        assert_eq!(group.varietal, "");
    }

    #[test]
    fn test_percentage_split() {
        let records = vec![
            margaux("30", "A1"),
            BottleRecord::new()
                .with("iWine", 2)
                .with("Vintage", 2018)
                .with("Wine", "Barolo")
                .with("Valuation", "10"),
        ];
        let result = InventoryAggregator::default().aggregate(&records);
        assert_eq!(result.group("2015 Margaux").unwrap().percentage, 75.0);
        assert_eq!(result.group("2018 Barolo").unwrap().percentage, 25.0);
    }

    #[test]
    fn test_zero_value_cellar_has_zero_percentages() {
        let result = InventoryAggregator::default().aggregate(&[margaux("", "A1")]);
        let group = result.group("2015 Margaux").unwrap();
        assert_eq!(group.value_total, 0.0);
        assert_eq!(group.percentage, 0.0);
    }

    #[test]
    fn test_skips_records_without_wine_id() {
        let orphan = BottleRecord::new()
            .with("Vintage", 2015)
            .with("Wine", "Margaux")
            .with("Valuation", "500");
        let result = InventoryAggregator::default().aggregate(&[margaux("10", "A1"), orphan]);
        assert_eq!(result.totals.total_bottles, 1);
        assert_eq!(result.totals.total_value, 10.0);
        assert_eq!(result.bottles.len(), 1);
    }

    #[test]
    fn test_empty_inventory() {
        let result = InventoryAggregator::default().aggregate(&[]);
        assert_eq!(result, Aggregation::empty());
        assert!(result.is_empty());
        assert_eq!(result.totals.total_value, 0.0);
    }

    #[test]
    fn test_identical_bottles_get_distinct_ids() {
        let records = vec![margaux("10", "A1"), margaux("10", "A1"), margaux("10", "A1")];
        let result = InventoryAggregator::default().aggregate(&records);
        let ids: Vec<&str> = result.bottles.keys().map(String::as_str).collect();
        let base = ids[0];
        assert_eq!(ids[1], format!("{base}_1"));
        assert_eq!(ids[2], format!("{base}_2"));
        assert!(result.bottle(&format!("{base}_2")).is_some());
    }

    #[test]
    fn test_bottles_are_keyed_by_unique_id() {
        let records: Vec<BottleRecord> = (0..5000)
            .map(|i| margaux("10", &format!("R{i}")))
            .collect();
        let result = InventoryAggregator::default().aggregate(&records);
        assert_eq!(result.bottles.len(), 5000);
        assert!(result
            .bottles
            .iter()
            .all(|(id, bottle)| id == &bottle.unique_bottle_id));
        for id in result.bottles.keys() {
            assert_eq!(result.bottle(id).unwrap().unique_bottle_id, *id);
        }
        assert!(result.bottle("not-a-bottle").is_none());
        assert_eq!(result.bottles.values().next().unwrap().record.text("Bin"), "R0");
    }

    #[test]
    fn test_bottles_carry_parsed_amounts() {
        let record = margaux("12,50", "A1").with("Price", "9.99");
        let result = InventoryAggregator::default().aggregate(&[record]);
        let bottle = result.bottles.values().next().unwrap();
        assert_eq!(bottle.valuation, 12.5);
        assert_eq!(bottle.price, Some(9.99));
        assert_eq!(bottle.record.text("Bin"), "A1");
    }

    #[test]
    fn test_total_value_is_rounded() {
        let records = vec![margaux("10.004", "A1"), margaux("10.003", "A2")];
        let result = InventoryAggregator::default().aggregate(&records);
        assert_eq!(result.totals.total_value, 20.01);
    }

    #[test]
    fn test_group_serializes_with_attribute_names() {
        let result = InventoryAggregator::default().aggregate(&[margaux("10", "A1")]);
        let value = serde_json::to_value(result.group("2015 Margaux").unwrap()).unwrap();
        assert_eq!(value["type"], "");
        assert_eq!(value["beginconsume"], "");
        assert_eq!(value["count"], 1);
    }
}
