//! Trading signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-instrument signal produced by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    #[default]
    Hold,
    Sell,
}

impl Signal {
    /// Numeric score: +1 buy, 0 hold, -1 sell.
    pub fn score(&self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Hold => 0,
            Signal::Sell => -1,
        }
    }

    /// Map the sign of a score back to a signal.
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Signal::Buy
        } else if score < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Hold => write!(f, "HOLD"),
            Signal::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_score() {
        assert_eq!(Signal::Buy.score(), 1);
        assert_eq!(Signal::Sell.score(), -1);
        assert_eq!(Signal::from_score(0.4), Signal::Buy);
        assert_eq!(Signal::from_score(-2.0), Signal::Sell);
        assert_eq!(Signal::from_score(0.0), Signal::Hold);
    }

    #[test]
    fn test_signal_serde() {
        let json = serde_json::to_string(&Signal::Sell).unwrap();
        assert_eq!(json, "\"sell\"");
    }
}
