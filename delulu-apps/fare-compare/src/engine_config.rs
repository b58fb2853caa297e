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

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub settlement_currency: String,
    pub fx_base_url: String,
    pub fx_timeout_secs: u64,
    pub fx_cache_ttl_secs: u64,
    /// Value of one mile for programs without a fixed rate
    pub cost_per_mile: f64,
    /// Configured but not part of the equivalent cost
    pub connection_penalty: f64,
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_currency: "BRL".to_string(),
            fx_base_url: delulu_fx_rates::DEFAULT_BASE_URL.to_string(),
            fx_timeout_secs: 20,
            fx_cache_ttl_secs: delulu_fx_rates::DEFAULT_TTL.as_secs(),
            cost_per_mile: 0.015,
            connection_penalty: 80.0,
            top_n: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.settlement_currency.trim().is_empty(),
            "Settlement currency is required"
        );
        ensure!(
            self.cost_per_mile.is_finite() && self.cost_per_mile > 0.0,
            "Cost per mile must be positive, got {}",
            self.cost_per_mile
        );
        ensure!(self.top_n > 0, "top_n must be at least 1");
        ensure!(!self.fx_base_url.trim().is_empty(), "FX base URL is required");
        Ok(())
    }

    pub fn fx_timeout(&self) -> Duration {
        Duration::from_secs(self.fx_timeout_secs)
    }

    pub fn fx_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fx_cache_ttl_secs)
    }

    pub fn settlement(&self) -> String {
        self.settlement_currency.trim().to_uppercase()
    }
}
