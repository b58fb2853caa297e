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

//! # Cash Fare Results Parser
//!
//! Side-effect free extraction of cash fares from a metasearch JSON response.
//!
//! The response lists itinerary "cores", each pointing at one (one-way) or two
//! (round-trip) legs and carrying booking options from several providers.
//! One candidate is kept per distinct leg combination: the cheapest.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::candidate_record::{
    CandidateLeg, CandidatePricing, CandidateRecord, CandidateSegment, json_array, json_str,
    json_string, json_u32,
};
use crate::offer_extractor::OfferExtractor;
use crate::offer_model::OfferSource;

pub const UNIDENTIFIED_AIRLINE: &str = "unidentified";

/// Consulted when the response's own `airlines` table has no entry
static FALLBACK_AIRLINE_NAMES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("LA", "LATAM"), ("AD", "AZUL"), ("G3", "GOL")]));

pub fn fallback_airline_name(code: &str) -> Option<&'static str> {
    FALLBACK_AIRLINE_NAMES.get(code).copied()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CashFareExtractor;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    OneWay(String),
    RoundTrip(String, String),
}

#[derive(Debug, Clone, PartialEq)]
struct PriceChoice {
    amount: f64,
    currency: Option<String>,
    provider_code: Option<String>,
    provider_name: Option<String>,
}

impl OfferExtractor for CashFareExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::CashProvider
    }

    fn extract(&self, raw: &Value) -> Vec<CandidateRecord> {
        let Some(data) = raw.get("data").filter(|d| d.is_object()) else {
            tracing::debug!("[cash] response has no data object");
            return Vec::new();
        };
        let results = json_array(data, "results");
        let has_legs = data
            .get("legs")
            .and_then(Value::as_object)
            .is_some_and(|legs| !legs.is_empty());
        if results.is_empty() || !has_legs {
            return Vec::new();
        }

        let mut kept: Vec<CandidateRecord> = Vec::new();
        let mut index: HashMap<DedupKey, usize> = HashMap::new();

        for item in results {
            if json_str(item, "type") != Some("core") {
                continue;
            }
            let leg_ids: Vec<&str> = json_array(item, "legs")
                .iter()
                .filter_map(|leg| json_str(leg, "id"))
                .collect();
            if leg_ids.is_empty() {
                continue;
            }

            let Some(choice) = cheapest_booking_option(item).or_else(|| bucket_top_price(item))
            else {
                tracing::trace!("[cash] core {:?} has no usable price", leg_ids);
                continue;
            };

            let (key, outbound, inbound) = if leg_ids.len() == 1 {
                let Some(out) = leg_summary(data, leg_ids[0]) else {
                    continue;
                };
                (DedupKey::OneWay(leg_ids[0].to_string()), out, None)
            } else {
                let (Some(out), Some(inb)) =
                    (leg_summary(data, leg_ids[0]), leg_summary(data, leg_ids[1]))
                else {
                    continue;
                };
                let key = DedupKey::RoundTrip(leg_ids[0].to_string(), leg_ids[1].to_string());
                (key, out, Some(inb))
            };

            let group_id = match &key {
                DedupKey::OneWay(id) => id.clone(),
                DedupKey::RoundTrip(out, inb) => format!("{out}|{inb}"),
            };

            let record = CandidateRecord {
                source: OfferSource::CashProvider,
                group_id: Some(group_id),
                airline: outbound.airlines.first().cloned(),
                outbound,
                inbound,
                pricing: CandidatePricing::Cash {
                    amount: choice.amount,
                    currency: choice.currency,
                    provider_code: choice.provider_code,
                    provider_name: choice.provider_name,
                },
                deeplink: json_string(item, "shareableUrl").unwrap_or_default(),
                checked_bag_included: false,
            };

            match index.get(&key) {
                Some(&i) => {
                    if choice.amount < kept[i].cash_amount().unwrap_or(f64::INFINITY) {
                        kept[i] = record;
                    }
                }
                None => {
                    index.insert(key, kept.len());
                    kept.push(record);
                }
            }
        }

        kept.sort_by(|a, b| {
            let pa = a.cash_amount().unwrap_or(f64::INFINITY);
            let pb = b.cash_amount().unwrap_or(f64::INFINITY);
            pa.total_cmp(&pb)
        });
        tracing::debug!("[cash] extracted {} distinct itineraries", kept.len());
        kept
    }
}

/// Amount from `{ "price": 123.4 }`, possibly nested one more level
fn price_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => obj.get("price").and_then(price_of),
        _ => None,
    }
}

/// A `{ price, currency }` object, as used by totalPrice/rawPrice/displayPrice/topPrice
fn priced_field(value: Option<&Value>) -> Option<(f64, Option<String>)> {
    let value = value.filter(|v| v.is_object())?;
    let amount = price_of(value)?;
    Some((amount, json_string(value, "currency")))
}

/// Cheapest booking option of a core.
///
/// Per option the amount is the structured total, else the raw fee price,
/// else the display price. Ties keep the first option seen.
fn cheapest_booking_option(core: &Value) -> Option<PriceChoice> {
    let mut best: Option<PriceChoice> = None;

    for option in json_array(core, "bookingOptions") {
        if !option.is_object() {
            continue;
        }
        let fees = option.get("fees").filter(|f| f.is_object());
        let quoted = fees
            .and_then(|f| {
                priced_field(f.get("totalPrice")).or_else(|| priced_field(f.get("rawPrice")))
            })
            .or_else(|| priced_field(option.get("displayPrice")));
        let Some((amount, currency)) = quoted else {
            continue;
        };

        if best.as_ref().is_none_or(|b| amount < b.amount) {
            best = Some(PriceChoice {
                amount,
                currency: currency
                    .or_else(|| json_string(option, "currency"))
                    .map(|c| c.to_uppercase()),
                provider_code: json_string(option, "providerCode"),
                provider_name: json_string(option, "providerName"),
            });
        }
    }

    best
}

fn bucket_top_price(core: &Value) -> Option<PriceChoice> {
    let mut best: Option<PriceChoice> = None;
    for bucket in json_array(core, "bookingOptionsBuckets") {
        let Some((amount, currency)) = priced_field(bucket.get("topPrice")) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| amount < b.amount) {
            best = Some(PriceChoice {
                amount,
                currency: currency.map(|c| c.to_uppercase()),
                provider_code: None,
                provider_name: None,
            });
        }
    }
    best
}

fn segment_ref_id(seg_ref: &Value) -> Option<&str> {
    match seg_ref {
        Value::String(s) => Some(s),
        Value::Object(_) => json_str(seg_ref, "id"),
        _ => None,
    }
}

fn leg_summary(data: &Value, leg_id: &str) -> Option<CandidateLeg> {
    let leg = data.get("legs")?.get(leg_id)?;
    if !leg.is_object() {
        return None;
    }

    let seg_refs = json_array(leg, "segments");
    let resolved: Vec<&Value> = seg_refs
        .iter()
        .filter_map(segment_ref_id)
        .filter_map(|sid| data.get("segments")?.get(sid))
        .filter(|seg| seg.is_object())
        .collect();

    // Segment details are only trusted when every reference resolved
    let segments = if !resolved.is_empty() && resolved.len() == seg_refs.len() {
        resolved
            .iter()
            .map(|seg| CandidateSegment {
                origin: json_string(seg, "origin"),
                destination: json_string(seg, "destination"),
                departure: json_string(seg, "departure"),
                arrival: json_string(seg, "arrival"),
                carrier: carrier_code(seg),
                flight_number: json_string(seg, "flightNumber"),
            })
            .collect()
    } else {
        Vec::new()
    };

    Some(CandidateLeg {
        id: Some(leg_id.to_string()),
        departure: json_string(leg, "departure"),
        arrival: json_string(leg, "arrival"),
        duration_minutes: json_u32(leg, "duration"),
        stops: Some(seg_refs.len().saturating_sub(1) as u32),
        airlines: airline_names(data, &resolved),
        segments,
    })
}

fn carrier_code(segment: &Value) -> Option<String> {
    json_string(segment, "airline").filter(|c| (2..=3).contains(&c.len()))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Airline names for a leg, in segment order without repeats.
///
/// Carrier codes are looked up in the response's table, then in the fallback
/// table. With no resolvable code the segments' display strings are used,
/// then the bare codes, then [`UNIDENTIFIED_AIRLINE`].
fn airline_names(data: &Value, segments: &[&Value]) -> Vec<String> {
    let table = data.get("airlines");
    let mut codes = Vec::new();
    let mut displays = Vec::new();
    for seg in segments {
        if let Some(code) = carrier_code(seg) {
            codes.push(code);
        }
        if let Some(display) = json_string(seg, "operationalDisplay") {
            push_unique(&mut displays, display);
        }
    }

    let lookup = |code: &str| -> Option<String> {
        table
            .and_then(|t| t.get(code))
            .and_then(|info| json_string(info, "name"))
            .or_else(|| fallback_airline_name(code).map(ToString::to_string))
    };

    if codes.iter().any(|c| lookup(c).is_some()) {
        let mut names = Vec::new();
        for code in &codes {
            push_unique(&mut names, lookup(code).unwrap_or_else(|| code.clone()));
        }
        return names;
    }
    if !displays.is_empty() {
        return displays;
    }
    if !codes.is_empty() {
        let mut names = Vec::new();
        for code in codes {
            push_unique(&mut names, code);
        }
        return names;
    }
    vec![UNIDENTIFIED_AIRLINE.to_string()]
}
