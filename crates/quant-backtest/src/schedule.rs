//! Rebalance schedule.
//!
//! The set of rebalance dates is a pure function of the frequency and the
//! trading calendar, so two runs over the same data always rebalance on the
//! same days.

use chrono::{Datelike, NaiveDate};
use quant_core::{BacktestError, BacktestResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How often the strategy is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Every trading day
    Daily,
    /// First trading day of each ISO week
    Weekly,
    /// First trading day of each calendar month
    #[default]
    Monthly,
    /// First trading day of each calendar quarter
    Quarterly,
    /// First trading day of each calendar year
    Annually,
    /// Every N-th trading day, starting with the first
    Interval(usize),
    /// Explicit dates; each maps to the first trading day on or after it
    Custom(BTreeSet<NaiveDate>),
}

impl RebalanceFrequency {
    pub fn validate(&self) -> BacktestResult<()> {
        match self {
            RebalanceFrequency::Interval(0) => Err(BacktestError::Config(
                "rebalance interval must be at least one trading day".into(),
            )),
            RebalanceFrequency::Custom(dates) if dates.is_empty() => Err(BacktestError::Config(
                "custom rebalance schedule has no dates".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Rebalance dates within `calendar` (ascending trading dates).
    pub fn rebalance_dates(&self, calendar: &[NaiveDate]) -> BTreeSet<NaiveDate> {
        rebalance_dates(self, calendar)
    }
}

/// Compute the rebalance dates for `frequency` over an ascending calendar.
pub fn rebalance_dates(frequency: &RebalanceFrequency, calendar: &[NaiveDate]) -> BTreeSet<NaiveDate> {
    debug_assert!(calendar.windows(2).all(|w| w[0] < w[1]));

    match frequency {
        RebalanceFrequency::Daily => calendar.iter().copied().collect(),
        RebalanceFrequency::Weekly => first_of_period(calendar, |d| {
            let week = d.iso_week();
            (week.year(), week.week())
        }),
        RebalanceFrequency::Monthly => first_of_period(calendar, |d| (d.year(), d.month())),
        RebalanceFrequency::Quarterly => first_of_period(calendar, |d| (d.year(), d.month0() / 3)),
        RebalanceFrequency::Annually => first_of_period(calendar, |d| (d.year(), 0)),
        RebalanceFrequency::Interval(n) => calendar.iter().step_by((*n).max(1)).copied().collect(),
        RebalanceFrequency::Custom(dates) => dates
            .iter()
            .filter_map(|date| {
                let idx = calendar.partition_point(|d| d < date);
                calendar.get(idx).copied()
            })
            .collect(),
    }
}

/// The first calendar date whose period key differs from the previous date's.
fn first_of_period<K, F>(calendar: &[NaiveDate], key: F) -> BTreeSet<NaiveDate>
where
    K: PartialEq,
    F: Fn(&NaiveDate) -> K,
{
    let mut dates = BTreeSet::new();
    let mut previous: Option<K> = None;
    for date in calendar {
        let current = key(date);
        if previous.as_ref() != Some(&current) {
            dates.insert(*date);
        }
        previous = Some(current);
    }
    dates
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceFrequency::Daily => write!(f, "daily"),
            RebalanceFrequency::Weekly => write!(f, "weekly"),
            RebalanceFrequency::Monthly => write!(f, "monthly"),
            RebalanceFrequency::Quarterly => write!(f, "quarterly"),
            RebalanceFrequency::Annually => write!(f, "annually"),
            RebalanceFrequency::Interval(n) => write!(f, "every:{}", n),
            RebalanceFrequency::Custom(dates) => {
                let dates: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
                write!(f, "custom:{}", dates.join(","))
            }
        }
    }
}

impl FromStr for RebalanceFrequency {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_lowercase();
        match lower.as_str() {
            "daily" | "1d" => return Ok(RebalanceFrequency::Daily),
            "weekly" | "1w" => return Ok(RebalanceFrequency::Weekly),
            "monthly" | "1m" => return Ok(RebalanceFrequency::Monthly),
            "quarterly" | "3m" => return Ok(RebalanceFrequency::Quarterly),
            "annually" | "yearly" | "1y" => return Ok(RebalanceFrequency::Annually),
            _ => {}
        }

        if let Some(n) = lower.strip_prefix("every:") {
            let n: usize = n
                .parse()
                .map_err(|_| BacktestError::Config(format!("Invalid rebalance interval: {}", s)))?;
            let frequency = RebalanceFrequency::Interval(n);
            frequency.validate()?;
            return Ok(frequency);
        }

        if let Some(list) = lower.strip_prefix("custom:") {
            let dates = list
                .split(',')
                .filter(|d| !d.trim().is_empty())
                .map(|d| {
                    NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                        .map_err(|_| BacktestError::Config(format!("Invalid rebalance date: {}", d)))
                })
                .collect::<BacktestResult<BTreeSet<_>>>()?;
            let frequency = RebalanceFrequency::Custom(dates);
            frequency.validate()?;
            return Ok(frequency);
        }

        Err(BacktestError::Config(format!("Unknown rebalance frequency: {}", s)))
    }
}
