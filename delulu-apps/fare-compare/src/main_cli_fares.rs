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

//! CLI comparing saved cash-fare and miles-redemption search responses.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use delulu_fare_compare::{
    ComparisonPipeline, CurrencyConverter, EngineConfig, HttpRateSource, OfferSource,
    PipelineResult, ProviderResponse, RateCache, SearchRequest, render_text,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "delulu-fares")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Cash-fare search response (JSON file), repeatable
    #[arg(long)]
    cash: Vec<PathBuf>,

    /// Miles-redemption search response (JSON file), repeatable
    #[arg(long)]
    miles: Vec<PathBuf>,

    /// Origin airport code (e.g., GRU)
    #[arg(short, long)]
    from: String,

    /// Destination airport code (e.g., MIA)
    #[arg(short, long)]
    to: String,

    /// Departure date (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short, long)]
    date: String,

    /// Return date for round trips (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short = 'R', long)]
    return_date: Option<String>,

    /// Number of passengers (adults)
    #[arg(short, long, default_value = "1")]
    passengers: u32,

    /// Keep only itineraries without connections
    #[arg(long)]
    direct_only: bool,

    /// Currency every price is converted into
    #[arg(long, env = "SETTLEMENT_CURRENCY", default_value = "BRL")]
    currency: String,

    /// FX rates API base URL
    #[arg(long, env = "FX_BASE_URL", default_value = "https://api.frankfurter.app")]
    fx_base_url: String,

    /// FX request timeout in seconds
    #[arg(long, env = "FX_TIMEOUT", default_value = "20")]
    fx_timeout: u64,

    /// FX rates cache lifetime in seconds
    #[arg(long, env = "FX_TTL_SECONDS", default_value = "21600")]
    fx_ttl_seconds: u64,

    /// Value of one mile for programs without a fixed rate
    #[arg(long, env = "COST_PER_MILE", default_value = "0.015")]
    cost_per_mile: f64,

    /// Connection penalty (recorded, not applied to the ranking)
    #[arg(long, env = "CONNECTION_PENALTY", default_value = "80.0")]
    connection_penalty: f64,

    /// Number of ranked offers to show
    #[arg(short = 'n', long, env = "TOP_N", default_value = "5")]
    top: usize,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Write the pipeline trace (.jsonl for one event per line)
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

/// Configure logging based on verbosity level
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse date string to NaiveDate
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .context(format!(
            "Invalid date format: {}. Use YYYY-MM-DD or YYYY/MM/DD",
            s
        ))
}

fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(100)
}

async fn load_payload(path: &Path) -> Result<Value> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Unreadable files become failed responses; the pipeline isolates them
async fn load_responses(source: OfferSource, paths: &[PathBuf]) -> Vec<ProviderResponse> {
    let mut responses = Vec::with_capacity(paths.len());
    for path in paths {
        let response = match load_payload(path).await {
            Ok(payload) => ProviderResponse::ok(source, payload),
            Err(e) => {
                tracing::warn!("{:#}", e);
                ProviderResponse::failed(source, format!("{:#}", e))
            }
        };
        responses.push(response);
    }
    responses
}

fn print_summary(result: &PipelineResult, currency: &str) {
    println!("{}", "=".repeat(get_terminal_width().min(96)));
    println!("  Request {}", result.request_id);
    match &result.best_overall {
        Some(best) => println!("  Best overall: {} ({})", best.airline, best.source),
        None => println!("  No offers found."),
    }
    if let Some(cash) = &result.best_cash {
        if let Some(price) = &cash.price {
            println!("  Best cash: {} - {}", cash.airline, price);
        }
    }
    if let Some(miles) = &result.best_miles {
        println!(
            "  Best miles: {} - {} miles + {} {:.2} (eq: {} {:.2})",
            miles.airline,
            miles.miles.unwrap_or(0),
            currency,
            miles.taxes.unwrap_or(0.0),
            currency,
            miles.equivalent_cost.unwrap_or(0.0)
        );
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    let depart_date = parse_date(&args.date)?;
    let mut builder = SearchRequest::builder(args.from.clone(), args.to.clone(), depart_date)
        .adults(args.passengers)
        .direct_only(args.direct_only);
    if let Some(ret) = &args.return_date {
        builder = builder.return_date(parse_date(ret)?);
    }
    let request = builder.build().context("Invalid search")?;

    let config = EngineConfig {
        settlement_currency: args.currency.clone(),
        fx_base_url: args.fx_base_url.clone(),
        fx_timeout_secs: args.fx_timeout,
        fx_cache_ttl_secs: args.fx_ttl_seconds,
        cost_per_mile: args.cost_per_mile,
        connection_penalty: args.connection_penalty,
        top_n: args.top,
    };
    config.validate().context("Invalid engine configuration")?;

    let source = HttpRateSource::new(config.fx_base_url.clone(), config.fx_timeout())
        .context("Failed to build FX client")?;
    let cache = Arc::new(RateCache::new(config.fx_cache_ttl()));
    let pipeline = ComparisonPipeline::new(config, CurrencyConverter::new(source, cache))?;

    let mut responses = load_responses(OfferSource::CashProvider, &args.cash).await;
    responses.extend(load_responses(OfferSource::MilesProvider, &args.miles).await);
    if responses.is_empty() {
        anyhow::bail!("Nothing to compare: pass at least one --cash or --miles file");
    }

    let result = pipeline
        .run(&request, responses, args.trace_out.as_deref())
        .await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else {
        let currency = pipeline.config().settlement();
        print_summary(&result, &currency);
        print!(
            "{}",
            render_text(
                &result.report_rows,
                &result.justification,
                &result.notes,
                get_terminal_width()
            )
        );
    }

    if let Some(path) = &result.trace_path {
        eprintln!("Trace saved to {}", path.display());
    }
    Ok(())
}
