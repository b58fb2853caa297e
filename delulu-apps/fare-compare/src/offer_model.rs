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

//! # Unified Offer Model
//!
//! Source-agnostic representation of a cash fare or a miles redemption.
//! Construction goes through [`UnifiedOfferBuilder::build`], which rejects
//! offers that downstream stages could not handle.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error("an offer must be priced in money or miles")]
    Unpriced,
    #[error("round-trip offer is missing its inbound itinerary")]
    MissingInbound,
    #[error("one-way offer cannot carry an inbound itinerary")]
    UnexpectedInbound,
    #[error("an itinerary needs at least one segment")]
    EmptyItinerary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSource {
    CashProvider,
    MilesProvider,
}

impl fmt::Display for OfferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferSource::CashProvider => write!(f, "cash_provider"),
            OfferSource::MilesProvider => write!(f, "miles_provider"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TripType {
    #[default]
    #[serde(rename = "oneway")]
    OneWay,
    #[serde(rename = "roundtrip")]
    RoundTrip,
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripType::OneWay => write!(f, "oneway"),
            TripType::RoundTrip => write!(f, "roundtrip"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoverCategory {
    Direct,
    Connection,
}

impl LayoverCategory {
    pub fn from_stops(stops: u32) -> Self {
        if stops == 0 {
            LayoverCategory::Direct
        } else {
            LayoverCategory::Connection
        }
    }
}

/// An amount of money in a given ISO currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn is_in(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency.trim())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}

/// One non-stop hop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub carrier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    /// Departure or arrival could not be read and was substituted
    pub estimated_times: bool,
}

/// One direction of travel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Itinerary {
    segments: Vec<Segment>,
    /// Provider-reported, layovers included
    pub duration_minutes: Option<u32>,
}

impl Itinerary {
    pub fn new(segments: Vec<Segment>, duration_minutes: Option<u32>) -> Result<Self, OfferError> {
        if segments.is_empty() {
            return Err(OfferError::EmptyItinerary);
        }
        Ok(Self {
            segments,
            duration_minutes,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn stops(&self) -> u32 {
        (self.segments.len() - 1) as u32
    }

    pub fn first_segment(&self) -> &Segment {
        &self.segments[0]
    }

    pub fn last_segment(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }
}

/// Per-direction breakdown of a round trip's price.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegSplit {
    pub price_out: Option<f64>,
    pub price_in: Option<f64>,
    pub miles_out: Option<u64>,
    pub miles_in: Option<u64>,
    pub taxes_out: Option<f64>,
    pub taxes_in: Option<f64>,
}

impl LegSplit {
    pub fn is_empty(&self) -> bool {
        *self == LegSplit::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedOffer {
    pub source: OfferSource,
    pub airline: String,
    pub trip_type: TripType,

    pub outbound: Itinerary,
    pub inbound: Option<Itinerary>,

    pub stops_out: Option<u32>,
    pub stops_in: Option<u32>,
    pub layover_out: Option<LayoverCategory>,
    pub layover_in: Option<LayoverCategory>,

    /// Settlement-currency price, or the provider's own currency when conversion failed
    pub price: Option<Price>,
    pub original_price: Option<Price>,
    pub miles: Option<u64>,
    pub taxes: Option<f64>,
    pub baggage_miles: Option<u64>,
    pub split: Option<LegSplit>,

    pub equivalent_cost: Option<f64>,
    pub provider: Option<String>,
    pub deeplink: String,
}

impl UnifiedOffer {
    pub fn builder(source: OfferSource, airline: String, outbound: Itinerary) -> UnifiedOfferBuilder {
        UnifiedOfferBuilder {
            source,
            airline,
            trip_type: TripType::OneWay,
            outbound,
            inbound: None,
            stops_out: None,
            stops_in: None,
            price: None,
            original_price: None,
            miles: None,
            taxes: None,
            baggage_miles: None,
            split: None,
            provider: None,
            deeplink: String::new(),
        }
    }

    /// Priced in miles only
    pub fn is_miles(&self) -> bool {
        self.price.is_none() && self.miles.is_some()
    }

    /// Money price, when it is expressed in `currency`
    pub fn price_in(&self, currency: &str) -> Option<f64> {
        self.price
            .as_ref()
            .filter(|p| p.is_in(currency))
            .map(|p| p.amount)
    }

    pub fn is_all_direct(&self) -> bool {
        let out = self
            .layover_out
            .unwrap_or_else(|| LayoverCategory::from_stops(self.outbound.stops()));
        let inb = self.inbound.as_ref().map(|it| {
            self.layover_in
                .unwrap_or_else(|| LayoverCategory::from_stops(it.stops()))
        });
        out == LayoverCategory::Direct && inb.is_none_or(|c| c == LayoverCategory::Direct)
    }

    pub fn total_duration_minutes(&self) -> u32 {
        self.outbound.duration_minutes.unwrap_or(0)
            + self
                .inbound
                .as_ref()
                .and_then(|it| it.duration_minutes)
                .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct UnifiedOfferBuilder {
    source: OfferSource,
    airline: String,
    trip_type: TripType,
    outbound: Itinerary,
    inbound: Option<Itinerary>,
    stops_out: Option<u32>,
    stops_in: Option<u32>,
    price: Option<Price>,
    original_price: Option<Price>,
    miles: Option<u64>,
    taxes: Option<f64>,
    baggage_miles: Option<u64>,
    split: Option<LegSplit>,
    provider: Option<String>,
    deeplink: String,
}

impl UnifiedOfferBuilder {
    pub fn trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = trip_type;
        self
    }

    pub fn inbound(mut self, inbound: Option<Itinerary>) -> Self {
        self.inbound = inbound;
        self
    }

    /// Provider-reported stop counts, taking precedence over segment counts
    pub fn stops(mut self, stops_out: Option<u32>, stops_in: Option<u32>) -> Self {
        self.stops_out = stops_out;
        self.stops_in = stops_in;
        self
    }

    pub fn price(mut self, price: Option<Price>) -> Self {
        self.price = price;
        self
    }

    pub fn original_price(mut self, original_price: Option<Price>) -> Self {
        self.original_price = original_price;
        self
    }

    pub fn miles(mut self, miles: Option<u64>) -> Self {
        self.miles = miles;
        self
    }

    pub fn taxes(mut self, taxes: Option<f64>) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn baggage_miles(mut self, baggage_miles: Option<u64>) -> Self {
        self.baggage_miles = baggage_miles;
        self
    }

    pub fn split(mut self, split: Option<LegSplit>) -> Self {
        self.split = split.filter(|s| !s.is_empty());
        self
    }

    pub fn provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    pub fn deeplink(mut self, deeplink: String) -> Self {
        self.deeplink = deeplink;
        self
    }

    pub fn build(self) -> Result<UnifiedOffer, OfferError> {
        if self.price.is_none() && self.miles.is_none() {
            return Err(OfferError::Unpriced);
        }
        match (self.trip_type, &self.inbound) {
            (TripType::RoundTrip, None) => return Err(OfferError::MissingInbound),
            (TripType::OneWay, Some(_)) => return Err(OfferError::UnexpectedInbound),
            _ => {}
        }

        Ok(UnifiedOffer {
            source: self.source,
            airline: self.airline,
            trip_type: self.trip_type,
            outbound: self.outbound,
            inbound: self.inbound,
            stops_out: self.stops_out,
            stops_in: self.stops_in,
            layover_out: None,
            layover_in: None,
            price: self.price,
            original_price: self.original_price,
            miles: self.miles,
            taxes: self.taxes,
            baggage_miles: self.baggage_miles,
            split: self.split,
            equivalent_cost: None,
            provider: self.provider,
            deeplink: self.deeplink,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;

    pub fn segment(origin: &str, destination: &str, carrier: &str) -> Segment {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        Segment {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure: day.and_hms_opt(10, 0, 0).unwrap(),
            arrival: day.and_hms_opt(18, 0, 0).unwrap(),
            carrier: carrier.to_string(),
            flight_number: None,
            estimated_times: false,
        }
    }

    pub fn direct() -> Itinerary {
        Itinerary::new(vec![segment("GRU", "MIA", "LA")], Some(480)).unwrap()
    }

    pub fn one_stop() -> Itinerary {
        Itinerary::new(
            vec![segment("GRU", "PTY", "CM"), segment("PTY", "MIA", "CM")],
            Some(660),
        )
        .unwrap()
    }
}
