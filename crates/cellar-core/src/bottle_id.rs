//! Per-bottle identifiers
//!
//! A bottle has no id of its own in the inventory export, so one is derived
//! from the fields that tell two bottles of the same wine apart.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::record::{fields, BottleRecord};

/// Number of hex characters kept from the digest
pub const BOTTLE_ID_HEX_LEN: usize = 16;

/// Fields hashed into the base id, in order
const ID_FIELDS: [&str; 5] = [
    fields::IWINE,
    fields::PURCHASE_DATE,
    fields::BARCODE,
    fields::LOCATION,
    fields::BIN,
];

/// Deterministic id for a record, before collision handling
pub fn base_bottle_id(record: &BottleRecord) -> String {
    let composite = ID_FIELDS
        .iter()
        .map(|field| record.text(field))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(composite.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..BOTTLE_ID_HEX_LEN].to_string()
}

/// Hands out ids that are unique within one aggregation run
///
/// Colliding ids get `_1`, `_2`, ... appended, taking the first suffix not
/// yet issued. Suffixes therefore depend on the order ids are requested in.
#[derive(Debug, Default)]
pub struct BottleIdAllocator {
    issued: HashSet<String>,
}

impl BottleIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base`, or the first free suffixed variant of it
    pub fn allocate(&mut self, base: String) -> String {
        let mut id = base.clone();
        let mut suffix = 0u64;
        while self.issued.contains(&id) {
            suffix += 1;
            id = format!("{base}_{suffix}");
        }
        self.issued.insert(id.clone());
        id
    }

    /// Number of ids handed out so far
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
