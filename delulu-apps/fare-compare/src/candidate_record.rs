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

//! # Candidate Records
//!
//! Provider-specific, not yet unified fare options as read from a raw search
//! response. Timing fields stay as the provider's strings; the offer mapper
//! turns them into typed itineraries.

use serde_json::Value;

use crate::offer_model::{LegSplit, OfferSource};

/// Largest stop count accepted from a provider for one leg
pub const MAX_LEG_STOPS: u32 = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSegment {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub carrier: Option<String>,
    pub flight_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateLeg {
    pub id: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub duration_minutes: Option<u32>,
    pub stops: Option<u32>,
    pub airlines: Vec<String>,
    pub segments: Vec<CandidateSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidatePricing {
    Cash {
        amount: f64,
        currency: Option<String>,
        provider_code: Option<String>,
        provider_name: Option<String>,
    },
    Miles {
        miles: u64,
        taxes: f64,
        baggage_miles: Option<u64>,
        split: LegSplit,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub source: OfferSource,
    /// Provider grouping key (flight group signature, leg id)
    pub group_id: Option<String>,
    pub outbound: CandidateLeg,
    pub inbound: Option<CandidateLeg>,
    pub pricing: CandidatePricing,
    pub airline: Option<String>,
    pub deeplink: String,
    pub checked_bag_included: bool,
}

impl CandidateRecord {
    pub fn miles(&self) -> Option<u64> {
        match self.pricing {
            CandidatePricing::Miles { miles, .. } => Some(miles),
            CandidatePricing::Cash { .. } => None,
        }
    }

    pub fn cash_amount(&self) -> Option<f64> {
        match self.pricing {
            CandidatePricing::Cash { amount, .. } => Some(amount),
            CandidatePricing::Miles { .. } => None,
        }
    }

    pub fn baggage_miles(&self) -> Option<u64> {
        match self.pricing {
            CandidatePricing::Miles { baggage_miles, .. } => baggage_miles,
            CandidatePricing::Cash { .. } => None,
        }
    }

    pub fn set_baggage_miles(&mut self, value: Option<u64>) {
        if let CandidatePricing::Miles { baggage_miles, .. } = &mut self.pricing {
            *baggage_miles = value;
        }
    }
}

// Tolerant JSON accessors: absent or wrong-typed fields read as `None`.

pub(crate) fn json_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}

pub(crate) fn json_string(value: &Value, key: &str) -> Option<String> {
    json_str(value, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn json_array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn json_u32(value: &Value, key: &str) -> Option<u32> {
    value.get(key)?.as_u64().and_then(|v| u32::try_from(v).ok())
}

/// Number, or numeric string with either decimal separator
pub(crate) fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}
