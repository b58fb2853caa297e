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

//! # Search Request
//!
//! The traveler's search as the comparison engine sees it.

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use serde::Serialize;

use crate::offer_model::TripType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    pub direct_only: bool,
}

impl SearchRequest {
    fn validate(&self) -> Result<()> {
        ensure!(!self.origin.is_empty(), "Origin airport is required");
        ensure!(
            !self.destination.is_empty(),
            "Destination airport is required"
        );
        ensure!(self.adults > 0, "At least one adult is required");
        if let Some(ret) = self.return_date {
            ensure!(
                ret >= self.depart_date,
                "Return date {} is before departure {}",
                ret,
                self.depart_date
            );
        }
        Ok(())
    }

    pub fn trip_type(&self) -> TripType {
        if self.return_date.is_some() {
            TripType::RoundTrip
        } else {
            TripType::OneWay
        }
    }

    pub fn builder(origin: String, destination: String, depart_date: NaiveDate) -> SearchRequestBuilder {
        SearchRequestBuilder {
            origin,
            destination,
            depart_date,
            return_date: None,
            adults: 1,
            direct_only: false,
        }
    }
}

#[derive(Clone)]
pub struct SearchRequestBuilder {
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: Option<NaiveDate>,
    adults: u32,
    direct_only: bool,
}

impl SearchRequestBuilder {
    pub fn return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn adults(mut self, adults: u32) -> Self {
        self.adults = adults;
        self
    }

    pub fn direct_only(mut self, direct_only: bool) -> Self {
        self.direct_only = direct_only;
        self
    }

    pub fn build(self) -> Result<SearchRequest> {
        let request = SearchRequest {
            origin: self.origin.trim().to_uppercase(),
            destination: self.destination.trim().to_uppercase(),
            depart_date: self.depart_date,
            return_date: self.return_date,
            adults: self.adults,
            direct_only: self.direct_only,
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
    }

    #[test]
    fn test_builder_normalizes_codes() {
        let req = SearchRequest::builder(" gru".into(), "mia ".into(), day(10))
            .build()
            .unwrap();
        assert_eq!(req.origin, "GRU");
        assert_eq!(req.destination, "MIA");
        assert_eq!(req.trip_type(), TripType::OneWay);
    }

    #[test]
    fn test_return_date_makes_roundtrip() {
        let req = SearchRequest::builder("GRU".into(), "FOR".into(), day(10))
            .return_date(day(20))
            .build()
            .unwrap();
        assert_eq!(req.trip_type(), TripType::RoundTrip);
    }

    #[test]
    fn test_invalid_requests() {
        assert!(SearchRequest::builder("".into(), "MIA".into(), day(10)).build().is_err());
        assert!(
            SearchRequest::builder("GRU".into(), "MIA".into(), day(10))
                .adults(0)
                .build()
                .is_err()
        );
        assert!(
            SearchRequest::builder("GRU".into(), "MIA".into(), day(10))
                .return_date(day(9))
                .build()
                .is_err(),
            "return before departure should fail"
        );
    }
}
