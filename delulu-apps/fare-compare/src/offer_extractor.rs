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

//! # Offer Extractors
//!
//! One extractor per upstream response shape. Extraction never fails:
//! absent or wrong-typed fields are read as "no value" and records without
//! a usable price are skipped.

use serde_json::Value;

use crate::candidate_record::CandidateRecord;
use crate::cash_results_parser::CashFareExtractor;
use crate::miles_results_parser::MilesRedemptionExtractor;
use crate::offer_model::OfferSource;

pub trait OfferExtractor {
    fn source(&self) -> OfferSource;
    fn extract(&self, raw: &Value) -> Vec<CandidateRecord>;
}

/// The closed set of supported response shapes
#[derive(Debug, Clone)]
pub enum SourceExtractor {
    Cash(CashFareExtractor),
    Miles(MilesRedemptionExtractor),
}

impl OfferExtractor for SourceExtractor {
    fn source(&self) -> OfferSource {
        match self {
            SourceExtractor::Cash(e) => e.source(),
            SourceExtractor::Miles(e) => e.source(),
        }
    }

    fn extract(&self, raw: &Value) -> Vec<CandidateRecord> {
        match self {
            SourceExtractor::Cash(e) => e.extract(raw),
            SourceExtractor::Miles(e) => e.extract(raw),
        }
    }
}

pub fn extractor_for(source: OfferSource) -> SourceExtractor {
    match source {
        OfferSource::CashProvider => SourceExtractor::Cash(CashFareExtractor),
        OfferSource::MilesProvider => SourceExtractor::Miles(MilesRedemptionExtractor::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_for_matches_source() {
        for source in [OfferSource::CashProvider, OfferSource::MilesProvider] {
            assert_eq!(extractor_for(source).source(), source);
        }
    }
}
