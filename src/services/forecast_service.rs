use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::cache::ForecastCache;
use crate::forecast::{
    AuthorityDelta, ForecastFilter, ForecastRow, ForecastTable, PivotError, PivotTable, Year,
};
use crate::importers::{ForecastLoadError, WorkbookLoader};

/// Error types for forecast queries
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to load forecasts: {0}")]
    Load(#[from] ForecastLoadError),

    #[error("Background load task failed: {0}")]
    Task(String),

    #[error("Forecast table is empty")]
    EmptyTable,

    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Invalid year range: {from} is after {to}")]
    InvalidYearRange { from: Year, to: Year },

    #[error("Cannot chart forecasts: {0}")]
    Pivot(#[from] PivotError),
}

/// Selection for a chart view; unset fields fall back to "everything available"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartRequest {
    pub indicator: Option<String>,
    pub authorities: Option<Vec<String>>,
    pub from: Option<Year>,
    pub to: Option<Year>,
}

/// Everything a dashboard needs to draw one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartView {
    pub indicator: String,
    /// Authorities reporting this indicator, sorted
    pub available_authorities: Vec<String>,
    /// Authorities shown, in selection order
    pub authorities: Vec<String>,
    /// Year bounds of the selected authorities' data, before range selection
    pub first_year: Option<Year>,
    pub last_year: Option<Year>,
    pub from: Option<Year>,
    pub to: Option<Year>,
    pub series: PivotTable,
    pub deltas: Vec<AuthorityDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableSummary {
    pub rows: usize,
    pub indicators: usize,
    pub authorities: usize,
    pub first_year: Option<Year>,
    pub last_year: Option<Year>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&ForecastTable> for TableSummary {
    fn from(table: &ForecastTable) -> Self {
        let (first_year, last_year) = table.year_range().unzip();
        Self {
            rows: table.len(),
            indicators: table.indicators().len(),
            authorities: table.authorities().len(),
            first_year,
            last_year,
            loaded_at: table.loaded_at(),
        }
    }
}

#[derive(Clone)]
pub struct ForecastService {
    loader: Arc<WorkbookLoader>,
    cache: Arc<ForecastCache>,
}

impl ForecastService {
    pub fn new(loader: WorkbookLoader, cache: Arc<ForecastCache>) -> Self {
        Self {
            loader: Arc::new(loader),
            cache,
        }
    }

    pub fn loader(&self) -> &WorkbookLoader {
        &self.loader
    }

    /// The full forecast table, parsed at most once per unchanged source file
    pub async fn table(&self) -> Result<Arc<ForecastTable>, ServiceError> {
        let loader = Arc::clone(&self.loader);
        let cache = Arc::clone(&self.cache);

        // Workbook parsing is blocking I/O
        let table = tokio::task::spawn_blocking(move || cache.get_or_load(&loader))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))??;

        Ok(table)
    }

    pub async fn summary(&self) -> Result<TableSummary, ServiceError> {
        let table = self.table().await?;
        Ok(TableSummary::from(table.as_ref()))
    }

    /// Drop the cached table and parse the source again
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<TableSummary, ServiceError> {
        let removed = self.cache.invalidate(self.loader.workbook_path());
        info!(
            "Reloading forecasts from {} ({} cache entries dropped)",
            self.loader.workbook_path().display(),
            removed
        );
        self.summary().await
    }

    pub async fn indicators(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.table().await?.indicators())
    }

    /// Authorities that publish `indicator`
    pub async fn authorities(&self, indicator: &str) -> Result<Vec<String>, ServiceError> {
        let table = self.table().await?;
        let by_indicator = table.filter(&ForecastFilter::indicator(indicator));
        if by_indicator.is_empty() {
            return Err(ServiceError::UnknownIndicator(indicator.to_string()));
        }
        Ok(by_indicator.authorities())
    }

    pub async fn filtered(&self, filter: &ForecastFilter) -> Result<Vec<ForecastRow>, ServiceError> {
        let table = self.table().await?;
        Ok(table.filter(filter).rows().to_vec())
    }

    #[instrument(skip(self))]
    pub async fn chart(&self, request: &ChartRequest) -> Result<ChartView, ServiceError> {
        let table = self.table().await?;
        build_chart(&table, request)
    }
}

/// Resolve a chart request against a table
///
/// Indicator defaults to the first in sort order, authorities to all that report
/// it, and the year range to the selected data's bounds. Requested years outside
/// the bounds are clamped into them.
pub fn build_chart(table: &ForecastTable, request: &ChartRequest) -> Result<ChartView, ServiceError> {
    let indicator = match &request.indicator {
        Some(indicator) => indicator.clone(),
        None => table
            .indicators()
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyTable)?,
    };

    let by_indicator = table.filter(&ForecastFilter::indicator(indicator.as_str()));
    if by_indicator.is_empty() {
        return Err(ServiceError::UnknownIndicator(indicator));
    }

    let available_authorities = by_indicator.authorities();
    let authorities: Vec<String> = match &request.authorities {
        Some(requested) => {
            let mut selected: Vec<String> = Vec::new();
            for authority in requested {
                if !available_authorities.contains(authority) {
                    warn!("Ignoring authority '{}' with no '{}' forecasts", authority, indicator);
                } else if !selected.contains(authority) {
                    selected.push(authority.clone());
                }
            }
            selected
        }
        None => available_authorities.clone(),
    };

    let selected = by_indicator.filter(&ForecastFilter {
        authorities: Some(authorities.clone()),
        ..ForecastFilter::default()
    });

    let bounds = selected.year_range();
    let (from, to) = match bounds {
        Some((first, last)) => {
            let from = request.from.unwrap_or(first).clamp(first, last);
            let to = request.to.unwrap_or(last).clamp(first, last);
            if from > to {
                return Err(ServiceError::InvalidYearRange { from, to });
            }
            (Some(from), Some(to))
        }
        None => (None, None),
    };

    let in_range = match (from, to) {
        (Some(from), Some(to)) => selected.filter(&ForecastFilter {
            years: Some(from..=to),
            ..ForecastFilter::default()
        }),
        _ => selected,
    };

    let series = in_range.pivot()?;
    let deltas = match (from, to) {
        (Some(from), Some(to)) => in_range.deltas(from, to, &authorities),
        _ => Vec::new(),
    };

    debug!(
        "Chart for '{}': {} authorities, {} years, {} deltas",
        indicator,
        authorities.len(),
        series.years.len(),
        deltas.len()
    );

    Ok(ChartView {
        indicator,
        available_authorities,
        authorities,
        first_year: bounds.map(|(first, _)| first),
        last_year: bounds.map(|(_, last)| last),
        from,
        to,
        series,
        deltas,
    })
}
