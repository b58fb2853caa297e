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

//! # Offer Report
//!
//! Display rows for ranked offers and a plain-text summary.

use serde::Serialize;
use std::fmt::Write;

use crate::offer_model::{OfferSource, TripType, UnifiedOffer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub source: OfferSource,
    pub airline: String,
    pub trip_type: TripType,
    pub layover: String,
    pub duration: String,
    pub base_price: String,
    pub taxes: String,
    pub equivalent: String,
    pub baggage: String,
    pub link: String,
}

/// `Xh Ym`, `Xh` or `Ym`; empty when unknown
pub fn fmt_duration(minutes: u32) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, 0) => String::new(),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

impl ReportRow {
    pub fn from_offer(offer: &UnifiedOffer, currency: &str) -> Self {
        let base_price = match (&offer.price, offer.miles) {
            (Some(price), _) => price.to_string(),
            (None, Some(miles)) => format!("{miles} miles"),
            (None, None) => String::new(),
        };
        Self {
            source: offer.source,
            airline: offer.airline.clone(),
            trip_type: offer.trip_type,
            layover: if offer.is_all_direct() {
                "direct".to_string()
            } else {
                "with connection".to_string()
            },
            duration: fmt_duration(offer.total_duration_minutes()),
            base_price,
            taxes: offer
                .taxes
                .map(|t| format!("{currency} {t:.2}"))
                .unwrap_or_default(),
            equivalent: offer
                .equivalent_cost
                .map(|c| format!("{currency} {c:.2}"))
                .unwrap_or_default(),
            baggage: offer
                .baggage_miles
                .map(|b| format!("{b} miles"))
                .unwrap_or_default(),
            link: offer.deeplink.clone(),
        }
    }
}

pub fn build_rows(offers: &[UnifiedOffer], currency: &str) -> Vec<ReportRow> {
    offers
        .iter()
        .map(|offer| ReportRow::from_offer(offer, currency))
        .collect()
}

/// Plain-text summary, rules sized to `width` columns
pub fn render_text(
    rows: &[ReportRow],
    justification: &[String],
    notes: &[String],
    width: usize,
) -> String {
    let rule_width = width.clamp(40, 100);
    let mut out = String::new();

    let _ = writeln!(out, "Best flight options");
    let _ = writeln!(out, "{}", "=".repeat(rule_width));
    if !justification.is_empty() {
        let _ = writeln!(out, "Why this one:");
        for line in justification {
            let _ = writeln!(out, "  - {line}");
        }
    }
    let _ = writeln!(out, "{}", "-".repeat(rule_width));

    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({}) - {}",
            i + 1,
            row.airline,
            row.source,
            row.trip_type.to_string().to_uppercase()
        );
        let taxes = if row.taxes.is_empty() { "none" } else { row.taxes.as_str() };
        let _ = write!(
            out,
            "   {} | taxes: {} | eq: {} | {} | {}",
            row.base_price, taxes, row.equivalent, row.layover, row.duration
        );
        if !row.baggage.is_empty() {
            let _ = write!(out, " | bag: {}", row.baggage);
        }
        let _ = writeln!(out);
        if !row.link.is_empty() {
            let _ = writeln!(out, "   {}", row.link);
        }
    }

    if !notes.is_empty() {
        let _ = writeln!(out, "{}", "-".repeat(rule_width));
        for note in notes {
            let _ = writeln!(out, "note: {note}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer_model::test_support::one_stop;
    use crate::offer_model::Price;

    #[test]
    fn test_fmt_duration() {
        assert_eq!(fmt_duration(0), "");
        assert_eq!(fmt_duration(45), "45m");
        assert_eq!(fmt_duration(120), "2h");
        assert_eq!(fmt_duration(135), "2h 15m");
    }

    #[test]
    fn test_row_for_miles_offer() {
        let mut offer = UnifiedOffer::builder(OfferSource::MilesProvider, "LATAM".into(), one_stop())
            .miles(Some(20_000))
            .taxes(Some(80.5))
            .baggage_miles(Some(26_000))
            .build()
            .unwrap();
        offer.equivalent_cost = Some(650.5);

        let row = ReportRow::from_offer(&offer, "BRL");
        assert_eq!(row.base_price, "20000 miles");
        assert_eq!(row.taxes, "BRL 80.50");
        assert_eq!(row.equivalent, "BRL 650.50");
        assert_eq!(row.baggage, "26000 miles");
        assert_eq!(row.layover, "with connection");
        assert_eq!(row.duration, "11h");
    }

    #[test]
    fn test_render_text_lists_rows_and_notes() {
        let offer = UnifiedOffer::builder(OfferSource::CashProvider, "GOL".into(), one_stop())
            .price(Some(Price::new(1234.5, "BRL")))
            .build()
            .unwrap();
        let rows = build_rows(&[offer], "BRL");
        let text = render_text(
            &rows,
            &["Best offer is a cash fare on GOL.".into()],
            &["fx down".into()],
            80,
        );
        assert!(text.contains("1. GOL (cash_provider) - ONEWAY"));
        assert!(text.contains("BRL 1234.50"));
        assert!(text.contains("note: fx down"));
    }
}
