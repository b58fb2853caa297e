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

//! # Layover Classifier
//!
//! Direct vs connection per leg. Provider-reported stop counts win over the
//! segment count. Classifying twice yields the same offer.

use crate::offer_model::{LayoverCategory, UnifiedOffer};

pub fn classify_offer(mut offer: UnifiedOffer) -> UnifiedOffer {
    let stops_out = offer.stops_out.unwrap_or_else(|| offer.outbound.stops());
    offer.stops_out = Some(stops_out);
    offer.layover_out = Some(LayoverCategory::from_stops(stops_out));

    match offer.inbound.as_ref() {
        Some(inbound) => {
            let stops_in = offer.stops_in.unwrap_or_else(|| inbound.stops());
            offer.stops_in = Some(stops_in);
            offer.layover_in = Some(LayoverCategory::from_stops(stops_in));
        }
        None => {
            offer.stops_in = None;
            offer.layover_in = None;
        }
    }
    offer
}

pub fn classify_many(offers: Vec<UnifiedOffer>) -> Vec<UnifiedOffer> {
    offers.into_iter().map(classify_offer).collect()
}

/// Keep offers whose every leg is direct
pub fn retain_direct(offers: Vec<UnifiedOffer>) -> Vec<UnifiedOffer> {
    offers.into_iter().filter(UnifiedOffer::is_all_direct).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer_model::test_support::{direct, one_stop};
    use crate::offer_model::{OfferSource, Price, TripType};

    fn offer_with(outbound_stops: Option<u32>) -> UnifiedOffer {
        UnifiedOffer::builder(OfferSource::CashProvider, "COPA".into(), one_stop())
            .trip_type(TripType::RoundTrip)
            .inbound(Some(direct()))
            .stops(outbound_stops, None)
            .price(Some(Price::new(900.0, "BRL")))
            .build()
            .unwrap()
    }

    #[test]
    fn test_segment_count_drives_classification() {
        let offer = classify_offer(offer_with(None));
        assert_eq!(offer.stops_out, Some(1));
        assert_eq!(offer.layover_out, Some(LayoverCategory::Connection));
        assert_eq!(offer.stops_in, Some(0));
        assert_eq!(offer.layover_in, Some(LayoverCategory::Direct));
        assert!(!offer.is_all_direct());
    }

    #[test]
    fn test_explicit_stops_take_precedence() {
        let offer = classify_offer(offer_with(Some(0)));
        assert_eq!(offer.layover_out, Some(LayoverCategory::Direct));
        assert!(offer.is_all_direct());
    }

    #[test]
    fn test_idempotent() {
        let once = classify_offer(offer_with(None));
        let twice = classify_offer(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_retain_direct() {
        let offers = classify_many(vec![offer_with(None), offer_with(Some(0))]);
        let direct_only = retain_direct(offers);
        assert_eq!(direct_only.len(), 1);
        assert_eq!(direct_only[0].stops_out, Some(0));
    }
}
