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

// Library for delulu-fare-compare
// Cash fares vs miles redemptions, normalized and ranked by equivalent cost

mod baggage_tiers;
mod candidate_record;
mod cash_results_parser;
mod engine_config;
mod layover_classifier;
mod miles_results_parser;
mod offer_extractor;
mod offer_mapper;
mod offer_model;
mod offer_ranking;
mod offer_report;
mod pipeline_tracer;
mod search_pipeline;
mod search_request;

pub use baggage_tiers::{
    BaggageMilesTable, PricedTier, TierSelection, dedup_miles_candidates, has_checked_bag,
    infer_global_baggage, select_tiers,
};
pub use candidate_record::{
    CandidateLeg, CandidatePricing, CandidateRecord, CandidateSegment, MAX_LEG_STOPS,
};
pub use cash_results_parser::{CashFareExtractor, UNIDENTIFIED_AIRLINE, fallback_airline_name};
pub use engine_config::EngineConfig;
pub use layover_classifier::{classify_many, classify_offer, retain_direct};
pub use miles_results_parser::{DEFAULT_PROGRAM, MilesRedemptionExtractor};
pub use offer_extractor::{OfferExtractor, SourceExtractor, extractor_for};
pub use offer_mapper::{MappingContext, map_candidate, parse_timestamp, quoted_price};
pub use offer_model::*;
pub use offer_ranking::{
    MILES_PROGRAM_COST_PER_MILE, NO_OFFERS_LINE, NOTHING_COMPARABLE_LINE, Ranking,
    cost_per_mile_for, equivalent_cost, rank_offers,
};
pub use offer_report::{ReportRow, build_rows, fmt_duration, render_text};
pub use pipeline_tracer::{PipelineTracer, StageSpan, StageStatus, TraceEvent};
pub use search_pipeline::{
    ComparisonPipeline, NO_DIRECT_FLIGHTS_LINE, PipelineResult, ProviderResponse, new_request_id,
};
pub use search_request::{SearchRequest, SearchRequestBuilder};

// FX collaborators, so callers need a single dependency
pub use delulu_fx_rates::{
    Clock, CurrencyConverter, FxError, HttpRateSource, RateCache, RateSource, SystemClock,
};
