//!  Delulu Fare Compare
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Baggage Tier Inference
//!
//! Miles programs sell the same itinerary at several price levels and rarely
//! say which one includes a checked bag. Within one flight group:
//!
//! 1. the base tier is the cheapest miles level, ties going to the lowest taxes
//! 2. the baggage tier is the cheapest level above base flagged with a checked bag,
//!    else the next level above base whatever its flags say
//! 3. a baggage tier at or below base is never reported
//!
//! Across a whole search, [`BaggageMilesTable`] learns `base miles -> baggage miles`
//! and backfills groups where the group itself offered no second level.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::candidate_record::{CandidateRecord, json_array};

const CHECKED_BAG_TYPES: [&str; 4] = ["despachar", "checked", "checkedbag", "bagagem_despachada"];
const CHECKED_BAG_DESCRIPTION_MARKER: &str = "despach";

/// One miles price level of a flight group
#[derive(Debug, Clone, PartialEq)]
pub struct PricedTier<T> {
    pub miles: u64,
    pub taxes: f64,
    pub has_checked_bag: bool,
    pub record: T,
}

#[derive(Debug, PartialEq)]
pub struct TierSelection<'a, T> {
    pub base: &'a PricedTier<T>,
    pub baggage_miles: Option<u64>,
}

/// Whether a raw miles offer declares an included checked bag
pub fn has_checked_bag(offer: &Value) -> bool {
    json_array(offer, "baggageIncluded").iter().any(|entry| {
        if !entry.get("isIncluded").and_then(Value::as_bool).unwrap_or(false) {
            return false;
        }
        let kind = entry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        CHECKED_BAG_TYPES.contains(&kind.as_str())
            || kind.contains(CHECKED_BAG_DESCRIPTION_MARKER)
            || description.contains(CHECKED_BAG_DESCRIPTION_MARKER)
            || description.contains("checked")
    })
}

/// Base and baggage tiers of one flight group. `None` when the group has no
/// positive miles level.
pub fn select_tiers<T>(tiers: &[PricedTier<T>]) -> Option<TierSelection<'_, T>> {
    let base = tiers
        .iter()
        .filter(|t| t.miles > 0)
        .min_by(|a, b| a.miles.cmp(&b.miles).then(a.taxes.total_cmp(&b.taxes)))?;

    let above_base = || tiers.iter().filter(|t| t.miles > base.miles);
    let flagged = above_base().filter(|t| t.has_checked_bag).map(|t| t.miles).min();
    let baggage_miles = flagged
        .or_else(|| above_base().map(|t| t.miles).min())
        .filter(|&bag| bag > base.miles);

    Some(TierSelection {
        base,
        baggage_miles,
    })
}

/// Minimum observed baggage miles for each distinct base miles value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaggageMilesTable {
    by_base_miles: HashMap<u64, u64>,
}

impl BaggageMilesTable {
    pub fn learn(&mut self, base_miles: u64, baggage_miles: u64) {
        if baggage_miles <= base_miles {
            return;
        }
        self.by_base_miles
            .entry(base_miles)
            .and_modify(|known| *known = (*known).min(baggage_miles))
            .or_insert(baggage_miles);
    }

    pub fn learn_from(records: &[CandidateRecord]) -> Self {
        let mut table = Self::default();
        for record in records {
            if let (Some(miles), Some(bag)) = (record.miles(), record.baggage_miles()) {
                table.learn(miles, bag);
            }
        }
        table
    }

    pub fn lookup(&self, base_miles: u64) -> Option<u64> {
        self.by_base_miles.get(&base_miles).copied()
    }

    pub fn len(&self) -> usize {
        self.by_base_miles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_base_miles.is_empty()
    }

    /// Fill missing baggage tiers and clear invalid ones. Returns the number of
    /// records that gained a baggage tier.
    pub fn backfill(&self, records: Vec<CandidateRecord>) -> (Vec<CandidateRecord>, usize) {
        let mut filled = 0;
        let records = records
            .into_iter()
            .map(|mut record| {
                let Some(miles) = record.miles() else {
                    return record;
                };
                match record.baggage_miles() {
                    None => {
                        if let Some(bag) = self.lookup(miles) {
                            record.set_baggage_miles(Some(bag));
                            filled += 1;
                        }
                    }
                    Some(bag) if bag <= miles => record.set_baggage_miles(None),
                    Some(_) => {}
                }
                record
            })
            .collect();
        (records, filled)
    }
}

/// Drop repeated flight groups seen across several responses of one search,
/// keyed by group id and outbound departure. First occurrence wins.
pub fn dedup_miles_candidates(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.group_id.clone(), r.outbound.departure.clone())))
        .collect()
}

/// Dedup, learn, then backfill, as one pass over a search's miles candidates
pub fn infer_global_baggage(records: Vec<CandidateRecord>) -> (Vec<CandidateRecord>, BaggageMilesTable, usize) {
    let records = dedup_miles_candidates(records);
    let table = BaggageMilesTable::learn_from(&records);
    let (records, filled) = table.backfill(records);
    tracing::debug!(
        "[baggage] learned {} base levels, backfilled {} groups",
        table.len(),
        filled
    );
    (records, table, filled)
}
