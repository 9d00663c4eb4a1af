// Forecast module
//
// Turns the published forecast workbook into a long-format table:
// - coercion: best-effort cell conversion (text, year, value)
// - block_parser: fixed-width authority blocks -> ForecastRow
// - table: immutable table plus the derived views the dashboard needs
// - year: numeric year label with exact ordering

pub mod block_parser;
pub mod coercion;
pub mod table;
pub mod year;

pub use block_parser::{
    column_name, parse, BlockParser, EmptyAuthorityPolicy, ForecastRow, MalformedLayoutError, ParseStats,
    RawSheet, DEFAULT_BLOCK_WIDTH,
};
pub use table::{
    AuthorityDelta, ForecastFilter, ForecastTable, PivotError, PivotSeries, PivotTable,
};
pub use year::Year;
