//! Read-only portfolio view handed to strategies.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The current portfolio as a strategy sees it at allocation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    pub as_of: Option<NaiveDate>,
    pub cash: Decimal,
    pub total_value: Decimal,
    pub quantities: BTreeMap<String, Decimal>,
    /// Fraction of total value per held symbol
    pub weights: BTreeMap<String, f64>,
}

impl Holdings {
    pub fn is_holding(&self, symbol: &str) -> bool {
        self.quantities
            .get(symbol)
            .map(|q| !q.is_zero())
            .unwrap_or(false)
    }

    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.quantities.keys()
    }
}
