use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::RangeInclusive;
use thiserror::Error;
use utoipa::ToSchema;

use crate::forecast::block_parser::ForecastRow;
use crate::forecast::year::Year;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("More than one value for authority '{authority}' in year {year}")]
    Duplicate { year: Year, authority: String },
}

/// Normalized forecast table
///
/// Never mutated after construction; every query builds a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
    loaded_at: DateTime<Utc>,
}

/// Row selection for derived views. `None` fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastFilter {
    pub indicator: Option<String>,
    pub authorities: Option<Vec<String>>,
    pub years: Option<RangeInclusive<Year>>,
}

/// Year x Authority -> Value, shaped for line charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PivotTable {
    pub years: Vec<Year>,
    pub series: Vec<PivotSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PivotSeries {
    pub authority: String,
    /// One entry per year in `PivotTable::years`
    pub values: Vec<Option<f64>>,
}

/// Change in an authority's forecast between two years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthorityDelta {
    pub authority: String,
    pub start: f64,
    pub end: f64,
    pub delta: f64,
    pub delta_pct: f64,
}

impl AuthorityDelta {
    pub fn new(authority: impl Into<String>, start: f64, end: f64) -> Self {
        let delta = end - start;
        let delta_pct = if start != 0.0 {
            delta / start * 100.0
        } else {
            0.0
        };

        Self {
            authority: authority.into(),
            start,
            end,
            delta,
            delta_pct,
        }
    }
}

impl ForecastFilter {
    pub fn indicator(indicator: impl Into<String>) -> Self {
        Self {
            indicator: Some(indicator.into()),
            ..Self::default()
        }
    }

    fn matches(&self, row: &ForecastRow) -> bool {
        if let Some(indicator) = &self.indicator {
            if &row.indicator != indicator {
                return false;
            }
        }
        if let Some(authorities) = &self.authorities {
            if !authorities.iter().any(|a| a == &row.authority) {
                return false;
            }
        }
        if let Some(years) = &self.years {
            if !years.contains(&row.year) {
                return false;
            }
        }
        true
    }
}

impl ForecastTable {
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        Self {
            rows,
            loaded_at: Utc::now(),
        }
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// When the source workbook was parsed; derived views keep their parent's time
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Sorted distinct indicator names
    pub fn indicators(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| &r.indicator))
    }

    /// Sorted distinct authority names
    pub fn authorities(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| &r.authority))
    }

    /// Smallest and largest year present, if any
    pub fn year_range(&self) -> Option<(Year, Year)> {
        let min = self.rows.iter().map(|r| r.year).min()?;
        let max = self.rows.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    pub fn filter(&self, filter: &ForecastFilter) -> ForecastTable {
        ForecastTable {
            rows: self
                .rows
                .iter()
                .filter(|row| filter.matches(row))
                .cloned()
                .collect(),
            loaded_at: self.loaded_at,
        }
    }

    /// Pivot to Year x Authority
    ///
    /// Only meaningful for a single indicator; a repeated (year, authority) pair
    /// is reported instead of picking one of the values.
    pub fn pivot(&self) -> Result<PivotTable, PivotError> {
        let years: Vec<Year> = self
            .rows
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells: BTreeMap<&str, BTreeMap<Year, f64>> = BTreeMap::new();
        for row in &self.rows {
            let by_year = cells.entry(row.authority.as_str()).or_default();
            if by_year.insert(row.year, row.value).is_some() {
                return Err(PivotError::Duplicate {
                    year: row.year,
                    authority: row.authority.clone(),
                });
            }
        }

        let series = cells
            .into_iter()
            .map(|(authority, by_year)| PivotSeries {
                authority: authority.to_string(),
                values: years.iter().map(|y| by_year.get(y).copied()).collect(),
            })
            .collect();

        Ok(PivotTable { years, series })
    }

    /// Value change from `from` to `to` for each authority, in the given order
    ///
    /// Uses the first row found at each end. Authorities without a value at both
    /// ends are left out.
    pub fn deltas(&self, from: Year, to: Year, authorities: &[String]) -> Vec<AuthorityDelta> {
        let first_value = |authority: &str, year: Year| {
            self.rows
                .iter()
                .find(|r| r.authority == authority && r.year == year)
                .map(|r| r.value)
        };

        let mut seen = HashSet::new();
        authorities
            .iter()
            .filter(|a| seen.insert(a.as_str()))
            .filter_map(|authority| {
                let start = first_value(authority, from)?;
                let end = first_value(authority, to)?;
                Some(AuthorityDelta::new(authority.as_str(), start, end))
            })
            .collect()
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}
