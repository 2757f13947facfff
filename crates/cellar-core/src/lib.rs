//! Core types for the CellarTracker integration
//!
//! This crate holds the raw inventory record type and the pure aggregation
//! that turns a flat bottle list into:
//!
//! - wine groups keyed by a composite wine key (counts, value totals,
//!   averages, share of the cellar value)
//! - annotated bottles carrying a stable per-bottle identifier
//! - cellar-wide totals
//!
//! # Example
//!
//! ```
//! use cellar_core::{BottleRecord, InventoryAggregator};
//!
//! let records = vec![
//!     BottleRecord::new()
//!         .with("iWine", 1)
//!         .with("Vintage", 2015)
//!         .with("Wine", "Margaux")
//!         .with("Valuation", "10,00"),
//! ];
//!
//! let aggregation = InventoryAggregator::default().aggregate(&records);
//! assert_eq!(aggregation.totals.total_bottles, 1);
//! assert_eq!(aggregation.totals.total_value, 10.0);
//! ```

mod aggregate;
mod bottle_id;
mod record;

pub use aggregate::{
    Aggregation, AnnotatedBottle, CellarTotals, InventoryAggregator, WineGroup, WineKeyStyle,
    DEFAULT_WINE_KEY_STYLE,
};
pub use bottle_id::{base_bottle_id, BottleIdAllocator, BOTTLE_ID_HEX_LEN};
pub use record::{fields, parse_price, parse_valuation, scalar_text, BottleRecord};

/// Integration domain, used as the prefix of sensor unique ids
pub const DOMAIN: &str = "cellar_tracker";
