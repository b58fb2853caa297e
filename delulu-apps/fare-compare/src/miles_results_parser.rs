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

//! # Miles Redemption Results Parser
//!
//! Extracts one candidate per flight group from a miles-search response.
//!
//! ```text
//! flightGroups[]
//!   signature | humanSignature
//!   flightInfo.itineraries[]      outbound, then inbound for round trips
//!     stops, duration, segments[] { departure{airport,dateTime,time}, arrival{..},
//!                                   marketingCarrier{code,name}, flightNumber }
//!   offers[]
//!     price.pointsInfo { totalPoints, outboundPoints, inboundPoints }
//!     price.taxes[].amount, price.outboundTotal, price.inboundTotal
//!     baggageIncluded[] { isIncluded, type, description }
//!     booking.bookingUrl | suppliers[].bookingUrl
//! ```
//!
//! Offers without points are cash-only redemptions and are ignored.

use serde_json::Value;

use crate::baggage_tiers::{PricedTier, has_checked_bag, select_tiers};
use crate::candidate_record::{
    CandidateLeg, CandidatePricing, CandidateRecord, CandidateSegment, MAX_LEG_STOPS, json_array,
    json_string, json_u32, lenient_f64,
};
use crate::cash_results_parser::fallback_airline_name;
use crate::offer_extractor::OfferExtractor;
use crate::offer_model::{LegSplit, OfferSource};

pub const DEFAULT_PROGRAM: &str = "LATAM";

#[derive(Debug, Clone)]
pub struct MilesRedemptionExtractor {
    /// Airline label used when segments name no carrier
    program: String,
}

impl Default for MilesRedemptionExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl MilesRedemptionExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl OfferExtractor for MilesRedemptionExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::MilesProvider
    }

    fn extract(&self, raw: &Value) -> Vec<CandidateRecord> {
        let mut out = Vec::new();

        for group in json_array(raw, "flightGroups") {
            let tiers: Vec<PricedTier<&Value>> = json_array(group, "offers")
                .iter()
                .filter_map(|offer| {
                    let miles = points_total(offer)?;
                    Some(PricedTier {
                        miles,
                        taxes: sum_taxes(offer),
                        has_checked_bag: has_checked_bag(offer),
                        record: offer,
                    })
                })
                .collect();

            let Some(selection) = select_tiers(&tiers) else {
                continue;
            };
            let base = selection.base;
            let best = base.record;

            let itineraries = group
                .get("flightInfo")
                .map(|info| json_array(info, "itineraries"))
                .unwrap_or(&[]);
            let outbound = itineraries.first().map(leg_from_itinerary).unwrap_or_default();
            let inbound = itineraries.get(1).map(leg_from_itinerary);

            let price = best.get("price").unwrap_or(&Value::Null);
            let points_info = price.get("pointsInfo").unwrap_or(&Value::Null);
            let split = LegSplit {
                price_out: price.get("outboundTotal").and_then(lenient_f64),
                price_in: price.get("inboundTotal").and_then(lenient_f64),
                miles_out: points_info.get("outboundPoints").and_then(points_value),
                miles_in: points_info.get("inboundPoints").and_then(points_value),
                taxes_out: None,
                taxes_in: None,
            };

            let airline = outbound
                .airlines
                .first()
                .cloned()
                .unwrap_or_else(|| self.program.clone());

            out.push(CandidateRecord {
                source: OfferSource::MilesProvider,
                group_id: json_string(group, "signature")
                    .or_else(|| json_string(group, "humanSignature")),
                outbound,
                inbound,
                pricing: CandidatePricing::Miles {
                    miles: base.miles,
                    taxes: base.taxes,
                    baggage_miles: selection.baggage_miles,
                    split,
                },
                airline: Some(airline),
                deeplink: booking_url(best),
                checked_bag_included: base.has_checked_bag,
            });
        }

        out.sort_by(|a, b| {
            a.miles()
                .cmp(&b.miles())
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        tracing::debug!("[miles] extracted {} flight groups", out.len());
        out
    }
}

/// Positive points count: a number, or a string of plain digits.
/// Grouped strings like "12,000" or "1.500" are ambiguous and ignored.
fn points_value(value: &Value) -> Option<u64> {
    let points = match value {
        Value::Number(n) => match n.as_u64() {
            Some(p) => p,
            None => {
                let v = n.as_f64()?;
                if !(v.is_finite() && v >= 1.0) {
                    return None;
                }
                v.trunc() as u64
            }
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()?
        }
        _ => return None,
    };
    (points >= 1).then_some(points)
}

fn points_total(offer: &Value) -> Option<u64> {
    offer
        .get("price")?
        .get("pointsInfo")?
        .get("totalPoints")
        .and_then(points_value)
}

fn sum_taxes(offer: &Value) -> f64 {
    offer
        .get("price")
        .map(|price| json_array(price, "taxes"))
        .unwrap_or(&[])
        .iter()
        .filter_map(|tax| tax.get("amount").and_then(lenient_f64))
        .sum()
}

fn booking_url(offer: &Value) -> String {
    offer
        .get("booking")
        .and_then(|b| json_string(b, "bookingUrl"))
        .or_else(|| {
            json_array(offer, "suppliers")
                .iter()
                .find_map(|s| json_string(s, "bookingUrl"))
        })
        .unwrap_or_default()
}

/// `dateTime`, completed with `time` when it only holds a date
fn endpoint_time(endpoint: &Value) -> Option<String> {
    let date_time = json_string(endpoint, "dateTime");
    let time = json_string(endpoint, "time");
    match (date_time, time) {
        (Some(dt), Some(t)) if !dt.contains('T') && !dt.contains(' ') => Some(format!("{dt}T{t}")),
        (Some(dt), _) => Some(dt),
        (None, _) => None,
    }
}

fn flight_number(segment: &Value) -> Option<String> {
    match segment.get("flightNumber")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn carrier_name(segment: &Value) -> Option<String> {
    let carrier = segment.get("marketingCarrier")?;
    if let Some(name) = json_string(carrier, "name") {
        return Some(name.to_uppercase());
    }
    let code = json_string(carrier, "code")?.to_uppercase();
    Some(
        fallback_airline_name(&code)
            .map(ToString::to_string)
            .unwrap_or(code),
    )
}

fn leg_from_itinerary(itinerary: &Value) -> CandidateLeg {
    let raw_segments: Vec<&Value> = json_array(itinerary, "segments")
        .iter()
        .filter(|s| s.is_object())
        .collect();

    let endpoint = |seg: &Value, side: &str| seg.get(side).cloned().unwrap_or(Value::Null);
    let segments: Vec<CandidateSegment> = raw_segments
        .iter()
        .map(|seg| {
            let dep = endpoint(seg, "departure");
            let arr = endpoint(seg, "arrival");
            CandidateSegment {
                origin: json_string(&dep, "airport").or_else(|| json_string(&dep, "city")),
                destination: json_string(&arr, "airport").or_else(|| json_string(&arr, "city")),
                departure: endpoint_time(&dep),
                arrival: endpoint_time(&arr),
                carrier: seg
                    .get("marketingCarrier")
                    .and_then(|c| json_string(c, "code")),
                flight_number: flight_number(seg),
            }
        })
        .collect();

    let mut airlines: Vec<String> = Vec::new();
    for name in raw_segments.iter().filter_map(|s| carrier_name(s)) {
        if !airlines.contains(&name) {
            airlines.push(name);
        }
    }

    let stops = json_u32(itinerary, "stops")
        .filter(|&s| s <= MAX_LEG_STOPS)
        .or_else(|| (!segments.is_empty()).then(|| segments.len() as u32 - 1));

    CandidateLeg {
        id: json_string(itinerary, "id"),
        departure: segments.first().and_then(|s| s.departure.clone()),
        arrival: segments.last().and_then(|s| s.arrival.clone()),
        duration_minutes: json_u32(itinerary, "duration"),
        stops,
        airlines,
        segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offer(points: Value, taxes: &[Value], bag: bool, url: &str) -> Value {
        let taxes: Vec<Value> = taxes.iter().map(|t| json!({ "amount": t })).collect();
        json!({
            "price": { "pointsInfo": { "totalPoints": points }, "taxes": taxes },
            "baggageIncluded": [{ "isIncluded": bag, "type": "checked" }],
            "booking": { "bookingUrl": url }
        })
    }

    #[test]
    fn test_points_and_taxes_are_lenient() {
        let o = offer(json!("12000"), &[json!(50.5), json!("10,25"), json!("bad")], false, "");
        assert_eq!(points_total(&o), Some(12_000));
        assert!((sum_taxes(&o) - 60.75).abs() < 1e-9);
        assert_eq!(points_total(&offer(json!(0), &[], false, "")), None);
        assert_eq!(points_total(&json!({ "price": { "amount": 900 } })), None);
    }

    #[test]
    fn test_grouped_points_strings_are_ignored() {
        for grouped in ["12,000", "1.500", "12 000", "-5", "1e4"] {
            assert_eq!(points_total(&offer(json!(grouped), &[], false, "")), None, "{grouped}");
        }
        assert_eq!(points_total(&offer(json!(" 15000 "), &[], false, "")), Some(15_000));
        assert_eq!(points_total(&offer(json!(15000.0), &[], false, "")), Some(15_000));

        let raw = json!({ "flightGroups": [
            { "signature": "grouped", "offers": [offer(json!("12,000"), &[json!(40)], false, "")] },
            { "signature": "plain", "offers": [offer(json!(30000), &[json!(90)], false, "")] }
        ]});
        let records = MilesRedemptionExtractor::default().extract(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].group_id.as_deref(), Some("plain"));
        assert_eq!(records[0].miles(), Some(30_000));
    }

    #[test]
    fn test_implausible_stop_count_is_dropped() {
        let raw = json!({ "flightGroups": [
            { "signature": "g1",
              "flightInfo": { "itineraries": [{ "type": "outbound", "stops": 4_000_000_000u64 }] },
              "offers": [offer(json!(20000), &[json!(90)], false, "")] }
        ]});
        let records = MilesRedemptionExtractor::default().extract(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outbound.stops, None);

        let leg = leg_from_itinerary(&json!({ "stops": MAX_LEG_STOPS }));
        assert_eq!(leg.stops, Some(MAX_LEG_STOPS));
    }

    #[test]
    fn test_booking_url_fallback_to_suppliers() {
        let o = json!({
            "booking": { "bookingUrl": "" },
            "suppliers": [{ "name": "x" }, { "bookingUrl": "https://supplier.example/b" }]
        });
        assert_eq!(booking_url(&o), "https://supplier.example/b");
        assert_eq!(booking_url(&json!({})), "");
    }

    #[test]
    fn test_group_without_points_is_skipped() {
        let raw = json!({ "flightGroups": [
            { "signature": "cash-only", "offers": [{ "price": { "amount": 1200 } }] },
            { "signature": "g1", "offers": [offer(json!(20000), &[json!(90)], false, "https://b/1")] }
        ]});
        let records = MilesRedemptionExtractor::default().extract(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].group_id.as_deref(), Some("g1"));
        assert_eq!(records[0].airline.as_deref(), Some(DEFAULT_PROGRAM));
        assert_eq!(records[0].deeplink, "https://b/1");
    }

    #[test]
    fn test_endpoint_time_completion() {
        assert_eq!(
            endpoint_time(&json!({ "dateTime": "2026-05-01", "time": "10:05" })).as_deref(),
            Some("2026-05-01T10:05")
        );
        assert_eq!(
            endpoint_time(&json!({ "dateTime": "2026-05-01T10:05:00", "time": "10:05" })).as_deref(),
            Some("2026-05-01T10:05:00")
        );
        assert_eq!(endpoint_time(&json!({ "time": "10:05" })), None);
    }
}
