use crate::F;
use serde::{Deserialize, Serialize};

/// One raw `(date, price)` row as handed over by a loader.
/// `price` is `None` when the source cell was missing or not numeric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: String,
    pub price: Option<F>,
}

impl Observation {
    pub fn new(date: impl Into<String>, price: Option<F>) -> Self {
        Self { date: date.into(), price }
    }
}

/// Ordered price history with every entry finite and strictly positive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    dates: Vec<String>,
    prices: Vec<F>,
}

impl HistoricalSeries {
    /// Builds a series from raw observations, dropping missing, non-finite
    /// and non-positive prices while keeping the relative order of the rest.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut series = Self::default();
        for obs in observations {
            if let Some(price) = obs.price.filter(|p| is_valid_price(*p)) {
                series.dates.push(obs.date);
                series.prices.push(price);
            }
        }
        series
    }

    /// Builds an undated series; entries are labelled by their position.
    pub fn from_prices<I>(prices: I) -> Self
    where
        I: IntoIterator<Item = F>,
    {
        Self::from_observations(
            prices
                .into_iter()
                .enumerate()
                .map(|(i, p)| Observation::new(i.to_string(), Some(p))),
        )
    }

    pub fn prices(&self) -> &[F] {
        &self.prices
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_price(&self) -> Option<F> {
        self.prices.last().copied()
    }
}

fn is_valid_price(p: F) -> bool {
    p.is_finite() && p > 0.0
}
