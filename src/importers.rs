// ! Workbook importers for forecast spreadsheets

pub mod workbook_loader;

// Re-export commonly used items
pub use workbook_loader::{ForecastLoadError, WorkbookLoader, DEFAULT_SHEET_NAME};
