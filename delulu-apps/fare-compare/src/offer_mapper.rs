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

//! # Unified Offer Mapper
//!
//! Candidate record + search context -> [`UnifiedOffer`].
//!
//! Currency conversion is done by the caller; the mapper only receives the
//! settled price, if any. Unreadable timestamps are replaced by the request's
//! observation time and the affected segment is marked `estimated_times`.

use chrono::{DateTime, NaiveDateTime};

use crate::candidate_record::{
    CandidateLeg, CandidatePricing, CandidateRecord, CandidateSegment, MAX_LEG_STOPS,
};
use crate::cash_results_parser::UNIDENTIFIED_AIRLINE;
use crate::offer_model::{Itinerary, OfferError, Price, Segment, TripType, UnifiedOffer};
use crate::search_request::SearchRequest;

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

#[derive(Debug, Clone)]
pub struct MappingContext<'a> {
    pub request: &'a SearchRequest,
    pub settlement_currency: &'a str,
    /// Substituted for unreadable timestamps
    pub observed_at: NaiveDateTime,
}

/// Provider price of a cash candidate, in the provider's currency
/// (the settlement currency when the provider did not say)
pub fn quoted_price(record: &CandidateRecord, settlement_currency: &str) -> Option<Price> {
    match &record.pricing {
        CandidatePricing::Cash {
            amount, currency, ..
        } => Some(Price::new(
            *amount,
            currency.as_deref().unwrap_or(settlement_currency),
        )),
        CandidatePricing::Miles { .. } => None,
    }
}

/// Local wall-clock time from the timestamp shapes providers send.
/// Offsets are dropped, airports report local times.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Build the unified offer for one candidate.
///
/// `settled` is the cash price converted into the settlement currency; `None`
/// keeps the provider's own amount and currency.
pub fn map_candidate(
    record: &CandidateRecord,
    ctx: &MappingContext<'_>,
    settled: Option<Price>,
) -> Result<UnifiedOffer, OfferError> {
    let request = ctx.request;
    let trip_type = if record.inbound.is_some() {
        TripType::RoundTrip
    } else {
        request.trip_type()
    };
    let airline = record
        .airline
        .clone()
        .unwrap_or_else(|| UNIDENTIFIED_AIRLINE.to_string());

    let outbound = build_itinerary(
        &record.outbound,
        &request.origin,
        &request.destination,
        &airline,
        ctx,
    )?;
    let inbound = record
        .inbound
        .as_ref()
        .map(|leg| build_itinerary(leg, &request.destination, &request.origin, &airline, ctx))
        .transpose()?;

    let builder = UnifiedOffer::builder(record.source, airline, outbound)
        .trip_type(trip_type)
        .inbound(inbound)
        .stops(
            record.outbound.stops,
            record.inbound.as_ref().and_then(|leg| leg.stops),
        )
        .deeplink(record.deeplink.clone());

    let builder = match &record.pricing {
        CandidatePricing::Cash {
            provider_code,
            provider_name,
            ..
        } => {
            let original = quoted_price(record, ctx.settlement_currency);
            builder
                .price(settled.or_else(|| original.clone()))
                .original_price(original)
                .provider(provider_name.clone().or_else(|| provider_code.clone()))
        }
        CandidatePricing::Miles {
            miles,
            taxes,
            baggage_miles,
            split,
        } => builder
            .miles(Some(*miles))
            .taxes(Some(*taxes))
            .baggage_miles(*baggage_miles)
            .split(Some(split.clone())),
    };

    builder.build()
}

fn resolve_time(raw: Option<&str>, ctx: &MappingContext<'_>) -> (NaiveDateTime, bool) {
    match raw.and_then(parse_timestamp) {
        Some(dt) => (dt, false),
        None => {
            tracing::warn!(
                "[mapper] unreadable timestamp {:?}, using observation time {}",
                raw,
                ctx.observed_at
            );
            (ctx.observed_at, true)
        }
    }
}

fn build_segment(
    seg: &CandidateSegment,
    origin: &str,
    destination: &str,
    carrier: &str,
    ctx: &MappingContext<'_>,
) -> Segment {
    let (departure, dep_estimated) = resolve_time(seg.departure.as_deref(), ctx);
    let (arrival, arr_estimated) = resolve_time(seg.arrival.as_deref(), ctx);
    Segment {
        origin: seg.origin.clone().unwrap_or_else(|| origin.to_string()),
        destination: seg
            .destination
            .clone()
            .unwrap_or_else(|| destination.to_string()),
        departure,
        arrival,
        carrier: seg.carrier.clone().unwrap_or_else(|| carrier.to_string()),
        flight_number: seg.flight_number.clone(),
        estimated_times: dep_estimated || arr_estimated,
    }
}

/// Real segments when the provider detailed them, otherwise `stops + 1`
/// placeholder hops spanning the leg's endpoints and times. The hop count
/// is bounded by [`MAX_LEG_STOPS`].
fn build_itinerary(
    leg: &CandidateLeg,
    origin: &str,
    destination: &str,
    carrier: &str,
    ctx: &MappingContext<'_>,
) -> Result<Itinerary, OfferError> {
    let segments = if leg.segments.is_empty() {
        let placeholder = CandidateSegment {
            departure: leg.departure.clone(),
            arrival: leg.arrival.clone(),
            ..CandidateSegment::default()
        };
        let hop = build_segment(&placeholder, origin, destination, carrier, ctx);
        vec![hop; leg.stops.unwrap_or(0).min(MAX_LEG_STOPS) as usize + 1]
    } else {
        leg.segments
            .iter()
            .map(|seg| build_segment(seg, origin, destination, carrier, ctx))
            .collect()
    };
    Itinerary::new(segments, leg.duration_minutes)
}
