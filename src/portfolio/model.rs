//! Portfolio snapshot types.

use serde::{Deserialize, Serialize};

// == Position ==
/// One holding in a brokerage portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Instrument identifier
    pub figi: String,
    pub ticker: String,
    /// Display name
    pub name: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    /// Unrealized profit: `(current_price - average_price) * quantity`
    pub profit: f64,
}

impl Position {
    /// Creates a position and derives its unrealized profit.
    pub fn new(
        figi: impl Into<String>,
        ticker: impl Into<String>,
        name: impl Into<String>,
        quantity: f64,
        average_price: f64,
        current_price: f64,
    ) -> Self {
        Self {
            figi: figi.into(),
            ticker: ticker.into(),
            name: name.into(),
            quantity,
            average_price,
            current_price,
            profit: (current_price - average_price) * quantity,
        }
    }
}

// == Portfolio Snapshot ==
/// Positions plus total valuation at the time of the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub positions: Vec<Position>,
    pub total_value: f64,
    pub currency: String,
}

impl PortfolioSnapshot {
    pub fn total_profit(&self) -> f64 {
        self.positions.iter().map(|p| p.profit).sum()
    }
}
