pub mod forecast_service;

pub use forecast_service::{ChartRequest, ChartView, ForecastService, ServiceError, TableSummary};
