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

//! End-to-end pipeline runs over saved responses, with a canned FX source.

use chrono::{NaiveDate, NaiveDateTime};
use delulu_fare_compare::{
    ComparisonPipeline, CurrencyConverter, EngineConfig, FxError, NO_DIRECT_FLIGHTS_LINE,
    NO_OFFERS_LINE, OfferSource, ProviderResponse, RateCache, RateSource, SearchRequest,
    StageStatus, TraceEvent, TripType,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn load_fixture(name: &str) -> Value {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures-offers")
        .join(format!("{}.json", name));
    let body = std::fs::read_to_string(&fixture_path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}' at {:?}: {}", name, fixture_path, e));
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("Invalid JSON in '{}': {}", name, e))
}

/// Answers USD->BRL at 5.0, fails everything else
#[derive(Clone, Default)]
struct CannedRates {
    calls: Arc<AtomicUsize>,
}

impl RateSource for CannedRates {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64, FxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (from, to) {
            ("USD", "BRL") => Ok(5.0),
            _ => Err(FxError::MissingRate {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

fn pipeline(config: EngineConfig) -> (ComparisonPipeline<CannedRates>, Arc<AtomicUsize>) {
    let rates = CannedRates::default();
    let calls = rates.calls.clone();
    let converter = CurrencyConverter::new(rates, Arc::new(RateCache::default()));
    (ComparisonPipeline::new(config, converter).unwrap(), calls)
}

fn oneway(direct_only: bool) -> SearchRequest {
    SearchRequest::builder(
        "GRU".into(),
        "MIA".into(),
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
    )
    .direct_only(direct_only)
    .build()
    .unwrap()
}

fn observed() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 4, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn read_ndjson(path: &Path) -> Vec<TraceEvent> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_oneway_fixtures_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("trace.jsonl");
    let (pipeline, calls) = pipeline(EngineConfig::default());

    let responses = vec![
        ProviderResponse::ok(OfferSource::CashProvider, load_fixture("cash_oneway")),
        ProviderResponse::ok(OfferSource::MilesProvider, load_fixture("miles_oneway")),
    ];
    let result = pipeline
        .run_at(&oneway(false), responses, Some(&trace), observed())
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "one USD lookup per run");
    assert_eq!(result.cash_offers.len(), 3);
    assert_eq!(result.miles_offers.len(), 4);
    assert!(result.notes.is_empty(), "{:?}", result.notes);

    let costs: Vec<f64> = result.ranked.iter().filter_map(|o| o.equivalent_cost).collect();
    let expected = [342.0, 482.8, 670.0, 690.0, 980.5];
    assert_eq!(costs.len(), expected.len());
    for (got, want) in costs.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6, "{:?}", costs);
    }

    let best = result.best_overall.as_ref().unwrap();
    assert_eq!(best.source, OfferSource::MilesProvider);
    assert_eq!(best.miles, Some(12_000));
    assert!(result.justification[0].contains("miles redemption"));

    let best_cash = result.best_cash.as_ref().unwrap();
    assert_eq!(best_cash.airline, "Copa Airlines");
    assert_eq!(result.best_miles.as_ref().unwrap().miles, Some(12_000));

    // the USD fare settles at 5.0 and keeps its quote
    let gol = result.cash_offers.iter().find(|o| o.airline == "GOL").unwrap();
    assert_eq!(gol.price_in("BRL"), Some(1250.0));
    assert_eq!(gol.original_price.as_ref().unwrap().currency, "USD");

    // LA9000 learns its baggage tier from LA8084 and gets an estimated arrival
    let backfilled = result
        .miles_offers
        .iter()
        .find(|o| o.taxes == Some(120.0))
        .unwrap();
    assert_eq!(backfilled.baggage_miles, Some(25_000));
    let hop = &backfilled.outbound.segments()[0];
    assert!(hop.estimated_times);
    assert_eq!(hop.arrival, observed());

    assert_eq!(result.report_rows.len(), result.ranked.len());
    assert_eq!(result.trace_path.as_deref(), Some(trace.as_path()));

    let events = read_ndjson(&trace);
    assert_eq!(events.len(), 14, "seven stages, start and end each");
    assert!(events.iter().all(|e| e.request_id == result.request_id));
    assert!(events.iter().all(|e| e.status != StageStatus::Error));
    let stages: Vec<&str> = events
        .iter()
        .filter(|e| e.status == StageStatus::End)
        .map(|e| e.stage.as_str())
        .collect();
    assert_eq!(
        stages,
        vec![
            "cash_extract",
            "miles_extract",
            "baggage_backfill",
            "normalize",
            "layover_classify",
            "score_rank",
            "format_report"
        ]
    );
}

#[tokio::test]
async fn test_failed_provider_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("trace.json");
    let (pipeline, _) = pipeline(EngineConfig::default());

    let responses = vec![
        ProviderResponse::failed(OfferSource::CashProvider, "upstream timeout"),
        ProviderResponse::ok(OfferSource::MilesProvider, load_fixture("miles_oneway")),
    ];
    let result = pipeline
        .run_at(&oneway(false), responses, Some(&trace), observed())
        .await;

    assert!(result.cash_offers.is_empty());
    assert!(result.best_cash.is_none());
    assert_eq!(result.miles_offers.len(), 4);
    assert_eq!(
        result.best_overall.as_ref().unwrap().source,
        OfferSource::MilesProvider
    );

    let body = std::fs::read_to_string(&trace).unwrap();
    let events: Vec<TraceEvent> = serde_json::from_str(&body).unwrap();
    let failed: Vec<&TraceEvent> = events
        .iter()
        .filter(|e| e.status == StageStatus::Error)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].stage, "cash_extract");
    assert_eq!(failed[0].error.as_deref(), Some("upstream timeout"));
    assert!(events.iter().any(|e| e.stage == "format_report"));
}

#[tokio::test]
async fn test_no_responses_left() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("trace.jsonl");
    let (pipeline, calls) = pipeline(EngineConfig::default());

    let responses = vec![
        ProviderResponse::failed(OfferSource::CashProvider, "HTTP 503"),
        ProviderResponse::failed(OfferSource::MilesProvider, "HTTP 429"),
    ];
    let result = pipeline
        .run_at(&oneway(false), responses, Some(&trace), observed())
        .await;

    assert!(result.best_overall.is_none());
    assert!(result.ranked.is_empty());
    assert_eq!(result.justification, vec![NO_OFFERS_LINE.to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // trace is still written on the early exit
    let events = read_ndjson(&trace);
    assert_eq!(
        events.iter().filter(|e| e.status == StageStatus::Error).count(),
        2
    );
    assert!(!events.iter().any(|e| e.stage == "score_rank"));
}

#[tokio::test]
async fn test_direct_only_filter_can_empty_the_search() {
    let (pipeline, _) = pipeline(EngineConfig::default());
    let connecting_only = json!({ "flightGroups": [
        { "signature": "LA3000-GRU-BOG-MIA",
          "flightInfo": { "itineraries": [{ "type": "outbound", "stops": 1 }] },
          "offers": [{ "price": { "pointsInfo": { "totalPoints": 15000 } } }] }
    ]});

    let responses = vec![ProviderResponse::ok(OfferSource::MilesProvider, connecting_only)];
    let result = pipeline
        .run_at(&oneway(true), responses, None, observed())
        .await;

    assert!(result.best_overall.is_none());
    assert_eq!(result.justification, vec![NO_DIRECT_FLIGHTS_LINE.to_string()]);
    assert!(result.trace_path.is_none());
}

#[tokio::test]
async fn test_direct_only_keeps_direct_offers() {
    let (pipeline, _) = pipeline(EngineConfig::default());
    let responses = vec![
        ProviderResponse::ok(OfferSource::CashProvider, load_fixture("cash_oneway")),
        ProviderResponse::ok(OfferSource::MilesProvider, load_fixture("miles_oneway")),
    ];
    let result = pipeline
        .run_at(&oneway(true), responses, None, observed())
        .await;

    assert!(!result.ranked.is_empty());
    assert!(result.ranked.iter().all(|o| o.is_all_direct()));
    assert!(result.justification.iter().any(|l| l.contains("direct")));
}

#[tokio::test]
async fn test_unconvertible_currency_is_noted_and_unscored() {
    let (pipeline, calls) = pipeline(EngineConfig::default());
    let euro_fares = json!({ "data": {
        "results": [
            { "type": "core", "legs": [{ "id": "E1" }],
              "bookingOptions": [{ "providerCode": "EUROAGENT",
                  "fees": { "totalPrice": { "price": 200.0, "currency": "EUR" } } }] },
            { "type": "core", "legs": [{ "id": "E2" }],
              "bookingOptions": [{ "providerCode": "EUROAGENT",
                  "fees": { "totalPrice": { "price": 210.0, "currency": "EUR" } } }] },
            { "type": "core", "legs": [{ "id": "B1" }],
              "bookingOptions": [{ "providerCode": "LOCAL",
                  "fees": { "totalPrice": { "price": 1500.0, "currency": "BRL" } } }] }
        ],
        "legs": {
            "E1": { "departure": "2026-05-01T07:00:00", "arrival": "2026-05-01T15:00:00",
                    "segments": [{ "id": "S1" }] },
            "E2": { "departure": "2026-05-01T09:00:00", "arrival": "2026-05-01T17:00:00",
                    "segments": [{ "id": "S2" }] },
            "B1": { "departure": "2026-05-01T11:00:00", "arrival": "2026-05-01T19:00:00",
                    "segments": [{ "id": "S3" }] }
        }
    }});

    let responses = vec![ProviderResponse::ok(OfferSource::CashProvider, euro_fares)];
    let result = pipeline
        .run_at(&oneway(false), responses, None, observed())
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "failures are remembered per run");
    assert_eq!(result.notes.len(), 1);
    assert!(result.notes[0].contains("EUR"));

    assert_eq!(result.ranked.len(), 1);
    assert_eq!(result.ranked[0].equivalent_cost, Some(1500.0));
    assert_eq!(result.cash_offers.len(), 3, "unscored fares stay listed");

    let euro: Vec<_> = result
        .cash_offers
        .iter()
        .filter(|o| o.price.as_ref().is_some_and(|p| p.currency == "EUR"))
        .collect();
    assert_eq!(euro.len(), 2);
    assert!(euro.iter().all(|o| o.equivalent_cost.is_none()));
    assert_eq!(result.best_cash.as_ref().unwrap().price_in("BRL"), Some(1500.0));
}

#[tokio::test]
async fn test_roundtrip_fixtures() {
    let request = SearchRequest::builder(
        "GRU".into(),
        "MIA".into(),
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
    )
    .return_date(NaiveDate::from_ymd_opt(2026, 5, 8).unwrap())
    .build()
    .unwrap();
    let (pipeline, calls) = pipeline(EngineConfig {
        top_n: 2,
        ..EngineConfig::default()
    });

    let responses = vec![
        ProviderResponse::ok(OfferSource::CashProvider, load_fixture("cash_roundtrip")),
        ProviderResponse::ok(OfferSource::MilesProvider, load_fixture("miles_roundtrip")),
    ];
    let result = pipeline.run_at(&request, responses, None, observed()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0, "everything quoted in BRL");
    assert_eq!(result.ranked.len(), 2);
    assert!(result.ranked.iter().all(|o| o.trip_type == TripType::RoundTrip));
    assert!(result.ranked.iter().all(|o| o.inbound.is_some()));

    let best = result.best_overall.as_ref().unwrap();
    assert_eq!(best.source, OfferSource::MilesProvider);
    assert!((best.equivalent_cost.unwrap() - 1320.0).abs() < 1e-6);
    let split = best.split.as_ref().unwrap();
    assert_eq!(split.miles_out, Some(21_000));
    assert_eq!(result.ranked[1].equivalent_cost, Some(1800.0));
}

#[tokio::test]
async fn test_unwritable_trace_leaves_no_path() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("missing-dir").join("trace.jsonl");
    let (pipeline, _) = pipeline(EngineConfig::default());

    let responses = vec![ProviderResponse::ok(
        OfferSource::MilesProvider,
        load_fixture("miles_oneway"),
    )];
    let result = pipeline
        .run_at(&oneway(false), responses, Some(&trace), observed())
        .await;

    assert!(result.best_overall.is_some());
    assert!(result.trace_path.is_none());
    assert!(!trace.exists());
}

#[tokio::test]
async fn test_absurd_stop_count_does_not_sink_the_run() {
    let (pipeline, _) = pipeline(EngineConfig::default());
    let absurd = json!({ "flightGroups": [
        { "signature": "LA1-GRU-MIA",
          "flightInfo": { "itineraries": [{ "type": "outbound", "stops": 4_000_000_000u64 }] },
          "offers": [{ "price": { "pointsInfo": { "totalPoints": 20000 } } }] }
    ]});

    let responses = vec![
        ProviderResponse::ok(OfferSource::MilesProvider, absurd),
        ProviderResponse::ok(OfferSource::CashProvider, load_fixture("cash_oneway")),
    ];
    let result = pipeline
        .run_at(&oneway(false), responses, None, observed())
        .await;

    assert_eq!(result.miles_offers.len(), 1);
    let miles = &result.miles_offers[0];
    assert_eq!(miles.outbound.segments().len(), 1);
    assert_eq!(miles.stops_out, Some(0));
    assert_eq!(result.cash_offers.len(), 3);
    assert_eq!(result.best_overall.as_ref().unwrap().miles, Some(20_000));
}
