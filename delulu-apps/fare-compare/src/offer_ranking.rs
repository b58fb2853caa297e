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

//! # Equivalent-Cost Ranking
//!
//! Every offer gets one settlement-currency number:
//! - cash offers: their settled price
//! - miles offers: `miles * cost_per_mile + taxes`
//!
//! Redemptions from the miles provider are always valued at
//! [`MILES_PROGRAM_COST_PER_MILE`], whatever the configured default.
//!
//! Ranking is a stable ascending sort on that number. Connections do not move
//! an offer; they only show up in the justification.

use serde::Serialize;

use crate::engine_config::EngineConfig;
use crate::offer_model::{OfferSource, UnifiedOffer};

/// Settlement-currency value of one mile redeemed through the miles provider
pub const MILES_PROGRAM_COST_PER_MILE: f64 = 0.0285;

pub const NO_OFFERS_LINE: &str = "No offers found.";
pub const NOTHING_COMPARABLE_LINE: &str =
    "No offer could be compared in the settlement currency.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Ranking {
    pub top: Vec<UnifiedOffer>,
    pub best: Option<UnifiedOffer>,
    pub justification: Vec<String>,
    /// Every scored offer, ascending
    pub scored: Vec<UnifiedOffer>,
    /// Money price outside the settlement currency, input order
    pub unscored: Vec<UnifiedOffer>,
}

pub fn cost_per_mile_for(offer: &UnifiedOffer, config: &EngineConfig) -> f64 {
    match offer.source {
        OfferSource::MilesProvider => MILES_PROGRAM_COST_PER_MILE,
        OfferSource::CashProvider => config.cost_per_mile,
    }
}

pub fn equivalent_cost(offer: &UnifiedOffer, config: &EngineConfig) -> Option<f64> {
    if let Some(price) = &offer.price {
        return price
            .is_in(&config.settlement_currency)
            .then_some(price.amount);
    }
    let miles = offer.miles?;
    Some(miles as f64 * cost_per_mile_for(offer, config) + offer.taxes.unwrap_or(0.0))
}

pub fn rank_offers(offers: Vec<UnifiedOffer>, config: &EngineConfig) -> Ranking {
    if offers.is_empty() {
        return Ranking {
            justification: vec![NO_OFFERS_LINE.to_string()],
            ..Ranking::default()
        };
    }
    if config.connection_penalty != 0.0 {
        tracing::debug!(
            "[rank] connection penalty {} is configured but not applied",
            config.connection_penalty
        );
    }

    let mut scored = Vec::with_capacity(offers.len());
    let mut unscored = Vec::new();
    for mut offer in offers {
        match equivalent_cost(&offer, config) {
            Some(cost) => {
                offer.equivalent_cost = Some(cost);
                scored.push(offer);
            }
            None => {
                offer.equivalent_cost = None;
                unscored.push(offer);
            }
        }
    }

    // stable: equal costs keep input order
    scored.sort_by(|a: &UnifiedOffer, b: &UnifiedOffer| {
        let ca = a.equivalent_cost.unwrap_or(f64::INFINITY);
        let cb = b.equivalent_cost.unwrap_or(f64::INFINITY);
        ca.total_cmp(&cb)
    });

    let top: Vec<UnifiedOffer> = scored.iter().take(config.top_n).cloned().collect();
    let best = top.first().cloned();
    let justification = match &best {
        Some(best) => justify(best, config),
        None => vec![NOTHING_COMPARABLE_LINE.to_string()],
    };
    tracing::debug!(
        "[rank] {} scored, {} unscored, top {}",
        scored.len(),
        unscored.len(),
        top.len()
    );

    Ranking {
        top,
        best,
        justification,
        scored,
        unscored,
    }
}

fn justify(best: &UnifiedOffer, config: &EngineConfig) -> Vec<String> {
    let currency = config.settlement();
    let cost = best.equivalent_cost.unwrap_or_default();
    let mut lines = Vec::with_capacity(3);

    if best.is_miles() {
        lines.push(format!("Best offer is a miles redemption on {}.", best.airline));
        lines.push(format!(
            "Miles valued at {currency} {:.4} per mile plus taxes come to {currency} {cost:.2}.",
            cost_per_mile_for(best, config)
        ));
    } else {
        lines.push(format!("Best offer is a cash fare on {}.", best.airline));
        lines.push(format!("Total price is {currency} {cost:.2}."));
    }

    if best.is_all_direct() {
        lines.push("This itinerary has direct flights only.".to_string());
    } else {
        lines.push("This itinerary includes at least one connection.".to_string());
    }
    lines
}
