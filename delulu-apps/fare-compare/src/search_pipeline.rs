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

//! # Comparison Pipeline
//!
//! Sequences one search request through
//!
//! ```text
//! cash_extract / miles_extract  (per provider response)
//! baggage_backfill
//! normalize                     (currency conversion + unified mapping)
//! layover_classify              (+ direct-only filter)
//! score_rank
//! format_report
//! ```
//!
//! A failed provider response only removes that provider's offers. The trace
//! is written on every exit path when an output path is given.

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use delulu_fx_rates::{CurrencyConverter, RateSource};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::baggage_tiers::infer_global_baggage;
use crate::candidate_record::CandidateRecord;
use crate::engine_config::EngineConfig;
use crate::layover_classifier::{classify_many, retain_direct};
use crate::offer_extractor::{OfferExtractor, extractor_for};
use crate::offer_mapper::{MappingContext, map_candidate, quoted_price};
use crate::offer_model::{OfferSource, Price, UnifiedOffer};
use crate::offer_ranking::{NO_OFFERS_LINE, rank_offers};
use crate::offer_report::{ReportRow, build_rows};
use crate::pipeline_tracer::PipelineTracer;
use crate::search_request::SearchRequest;

pub const NO_DIRECT_FLIGHTS_LINE: &str =
    "No direct flights found; disable the direct-only filter to see connections.";

/// One provider call's outcome, as handed over by the search collaborators
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub source: OfferSource,
    pub payload: Result<Value, String>,
}

impl ProviderResponse {
    pub fn ok(source: OfferSource, payload: Value) -> Self {
        Self {
            source,
            payload: Ok(payload),
        }
    }

    pub fn failed(source: OfferSource, error: impl Into<String>) -> Self {
        Self {
            source,
            payload: Err(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub request_id: String,
    pub best_overall: Option<UnifiedOffer>,
    pub best_cash: Option<UnifiedOffer>,
    pub best_miles: Option<UnifiedOffer>,
    pub ranked: Vec<UnifiedOffer>,
    pub cash_offers: Vec<UnifiedOffer>,
    pub miles_offers: Vec<UnifiedOffer>,
    pub justification: Vec<String>,
    pub notes: Vec<String>,
    pub report_rows: Vec<ReportRow>,
    pub trace_path: Option<PathBuf>,
}

/// First 8 hex characters of a random v4 UUID
pub fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub struct ComparisonPipeline<S> {
    config: EngineConfig,
    converter: CurrencyConverter<S>,
}

impl<S: RateSource> ComparisonPipeline<S> {
    pub fn new(config: EngineConfig, converter: CurrencyConverter<S>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, converter })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn converter(&self) -> &CurrencyConverter<S> {
        &self.converter
    }

    pub async fn run(
        &self,
        request: &SearchRequest,
        responses: Vec<ProviderResponse>,
        trace_out: Option<&Path>,
    ) -> PipelineResult {
        self.run_at(request, responses, trace_out, Local::now().naive_local())
            .await
    }

    /// Same as [`Self::run`] with an explicit observation time, used for
    /// timestamps providers leave unreadable
    pub async fn run_at(
        &self,
        request: &SearchRequest,
        responses: Vec<ProviderResponse>,
        trace_out: Option<&Path>,
        observed_at: NaiveDateTime,
    ) -> PipelineResult {
        let request_id = new_request_id();
        tracing::info!(
            "[{}] comparing {} provider responses for {} -> {} on {}",
            request_id,
            responses.len(),
            request.origin,
            request.destination,
            request.depart_date
        );

        let mut tracer = PipelineTracer::new(request_id.clone());
        let mut result = PipelineResult {
            request_id,
            ..PipelineResult::default()
        };

        self.execute(request, responses, observed_at, &mut tracer, &mut result)
            .await;

        // trace_path only names a trace that was actually written
        if let Some(path) = trace_out {
            match tracer.save(path).await {
                Ok(()) => result.trace_path = Some(path.to_path_buf()),
                Err(e) => tracing::warn!("[{}] trace not saved: {:#}", result.request_id, e),
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &SearchRequest,
        responses: Vec<ProviderResponse>,
        observed_at: NaiveDateTime,
        tracer: &mut PipelineTracer,
        result: &mut PipelineResult,
    ) {
        let settlement = self.config.settlement();

        // Extraction, one traced stage per response
        let mut cash_candidates = Vec::new();
        let mut miles_candidates = Vec::new();
        for (i, response) in responses.into_iter().enumerate() {
            let stage = match response.source {
                OfferSource::CashProvider => "cash_extract",
                OfferSource::MilesProvider => "miles_extract",
            };
            let span = tracer.begin(stage, format!("response #{i}"));
            match &response.payload {
                Ok(payload) => {
                    let records = extractor_for(response.source).extract(payload);
                    tracer.finish(span, Some(records.len()));
                    match response.source {
                        OfferSource::CashProvider => cash_candidates.extend(records),
                        OfferSource::MilesProvider => miles_candidates.extend(records),
                    }
                }
                Err(e) => tracer.fail(span, e),
            }
        }

        let span = tracer.begin("baggage_backfill", "");
        let (miles_candidates, _table, filled) = infer_global_baggage(miles_candidates);
        tracing::debug!("[pipeline] {} baggage tiers backfilled", filled);
        tracer.finish(span, Some(miles_candidates.len()));

        let span = tracer.begin("normalize", settlement.clone());
        let ctx = MappingContext {
            request,
            settlement_currency: &settlement,
            observed_at,
        };
        let offers = self
            .normalize(cash_candidates, miles_candidates, &ctx, &mut result.notes)
            .await;
        tracer.finish(span, Some(offers.len()));
        if offers.is_empty() {
            result.justification = vec![NO_OFFERS_LINE.to_string()];
            return;
        }

        let span = tracer.begin(
            "layover_classify",
            if request.direct_only { "direct only" } else { "" },
        );
        let mut offers = classify_many(offers);
        if request.direct_only {
            offers = retain_direct(offers);
        }
        tracer.finish(span, Some(offers.len()));
        if offers.is_empty() {
            result.justification = vec![NO_DIRECT_FLIGHTS_LINE.to_string()];
            return;
        }

        let span = tracer.begin("score_rank", "");
        let ranking = rank_offers(offers, &self.config);

        let (mut cash_offers, miles_offers): (Vec<_>, Vec<_>) = ranking
            .scored
            .iter()
            .cloned()
            .partition(|o| o.source == OfferSource::CashProvider && o.price.is_some());
        result.best_cash = cash_offers
            .iter()
            .filter(|o| o.price_in(&settlement).is_some())
            .min_by(|a, b| {
                let pa = a.price_in(&settlement).unwrap_or(f64::INFINITY);
                let pb = b.price_in(&settlement).unwrap_or(f64::INFINITY);
                pa.total_cmp(&pb)
            })
            .cloned();
        result.best_miles = miles_offers.iter().find(|o| o.miles.is_some()).cloned();
        cash_offers.extend(ranking.unscored.iter().cloned());

        result.cash_offers = cash_offers;
        result.miles_offers = miles_offers;
        result.best_overall = ranking.best;
        result.ranked = ranking.top;
        result.justification = ranking.justification;
        tracer.finish(span, Some(result.ranked.len()));

        let span = tracer.begin("format_report", "");
        result.report_rows = build_rows(&result.ranked, &settlement);
        tracer.finish(span, Some(result.report_rows.len()));
    }

    /// Convert cash prices into the settlement currency and map every
    /// candidate. Candidates breaking an offer invariant are dropped.
    async fn normalize(
        &self,
        cash: Vec<CandidateRecord>,
        miles: Vec<CandidateRecord>,
        ctx: &MappingContext<'_>,
        notes: &mut Vec<String>,
    ) -> Vec<UnifiedOffer> {
        let settlement = ctx.settlement_currency;
        // one lookup per currency per request, failures included
        let mut rates: HashMap<String, Option<f64>> = HashMap::new();
        let mut offers = Vec::with_capacity(cash.len() + miles.len());
        let mut dropped = 0usize;

        for record in cash.iter().chain(miles.iter()) {
            let settled = match quoted_price(record, settlement) {
                Some(quoted) if quoted.is_in(settlement) => Some(quoted),
                Some(quoted) => {
                    let rate = match rates.get(&quoted.currency) {
                        Some(rate) => *rate,
                        None => {
                            let rate = match self.converter.rate(&quoted.currency, settlement).await {
                                Ok(rate) => Some(rate),
                                Err(e) => {
                                    tracing::warn!(
                                        "[normalize] {} -> {} unavailable: {}",
                                        quoted.currency,
                                        settlement,
                                        e
                                    );
                                    notes.push(format!(
                                        "Prices in {} could not be converted to {} ({}); they are shown in {} and left out of the ranking.",
                                        quoted.currency, settlement, e, quoted.currency
                                    ));
                                    None
                                }
                            };
                            rates.insert(quoted.currency.clone(), rate);
                            rate
                        }
                    };
                    rate.map(|r| Price::new(quoted.amount * r, settlement))
                }
                None => None,
            };

            match map_candidate(record, ctx, settled) {
                Ok(offer) => offers.push(offer),
                Err(e) => {
                    dropped += 1;
                    tracing::debug!(
                        "[normalize] dropped {} candidate {:?}: {}",
                        record.source,
                        record.group_id,
                        e
                    );
                }
            }
        }

        if dropped > 0 {
            tracing::warn!("[normalize] {} candidates dropped", dropped);
        }
        offers
    }
}
