/// Forecast Block Parser
///
/// Reshapes a sheet of side-by-side forecast blocks into long-format rows.
///
/// # Expected Sheet Structure:
/// ```text
/// Row 1: (blank) | Authority A | ... | Authority B | ...
/// Row 2: (blank) | 2023 | 2024 | ... | 2023 | 2024 | ...
/// Row 3+: Indicator | value | value | ... | value | value | ...
/// ```
/// Column A holds indicator names. Every following run of `block_width` columns is
/// one authority's forecast, with the authority name in the run's first column.
use calamine::{Data, Range};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::forecast::coercion::{cell_text, coerce_value, coerce_year};
use crate::forecast::year::Year;

/// Number of columns per forecast block in the published workbook
pub const DEFAULT_BLOCK_WIDTH: usize = 5;

/// Untyped cell grid as read from the workbook, addressed from A1
pub type RawSheet = Range<Data>;

const AUTHORITY_ROW: usize = 0;
const YEAR_ROW: usize = 1;
const FIRST_DATA_ROW: usize = 2;
const INDICATOR_COL: usize = 0;

/// One (indicator, year, authority) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastRow {
    #[serde(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Year")]
    pub year: Year,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Authority")]
    pub authority: String,
}

/// Sheet geometry that cannot be read as forecast blocks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedLayoutError {
    #[error("Block width must be a positive integer, got {0}")]
    InvalidBlockWidth(usize),

    #[error("Sheet has {rows} rows, need at least 3 (authority row, year row, one data row)")]
    TooFewRows { rows: usize },

    #[error("Sheet has {columns} columns, need at least {required} for block width {block_width}")]
    TooFewColumns {
        columns: usize,
        required: usize,
        block_width: usize,
    },

    #[error("{value_columns} value columns do not divide into blocks of {block_width} ({remainder} left over)")]
    RaggedBlocks {
        value_columns: usize,
        block_width: usize,
        remainder: usize,
    },

    /// `block` counts from 1 and `column` is the sheet's column letter
    #[error("Block {block} (column {column}) has no authority name")]
    EmptyAuthority { block: usize, column: String },
}

/// What to do with a block whose authority cell is blank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EmptyAuthorityPolicy {
    /// Log a warning and emit the block's rows with an empty authority
    #[default]
    Warn,
    /// Fail the parse with [`MalformedLayoutError::EmptyAuthority`]
    Reject,
}

/// Counters for cells and rows that were skipped rather than emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub blocks: usize,
    pub rows_emitted: usize,
    pub blank_values_skipped: usize,
    pub year_labels_skipped: usize,
    pub empty_indicator_rows: usize,
    pub empty_authorities: usize,
}

/// Parser for sheets laid out as repeating fixed-width forecast blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockParser {
    block_width: usize,
    empty_authority: EmptyAuthorityPolicy,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_WIDTH)
    }
}

impl BlockParser {
    pub fn new(block_width: usize) -> Self {
        Self {
            block_width,
            empty_authority: EmptyAuthorityPolicy::default(),
        }
    }

    pub fn with_empty_authority_policy(mut self, policy: EmptyAuthorityPolicy) -> Self {
        self.empty_authority = policy;
        self
    }

    pub fn block_width(&self) -> usize {
        self.block_width
    }

    pub fn empty_authority_policy(&self) -> EmptyAuthorityPolicy {
        self.empty_authority
    }

    pub fn parse(&self, sheet: &RawSheet) -> Result<Vec<ForecastRow>, MalformedLayoutError> {
        self.parse_with_stats(sheet).map(|(rows, _)| rows)
    }

    /// Parse every block, returning the rows and what was skipped along the way
    pub fn parse_with_stats(
        &self,
        sheet: &RawSheet,
    ) -> Result<(Vec<ForecastRow>, ParseStats), MalformedLayoutError> {
        let (num_rows, num_cols) = sheet_size(sheet);
        let num_blocks = self.validate_geometry(num_rows, num_cols)?;

        let mut rows = Vec::new();
        let mut stats = ParseStats {
            blocks: num_blocks,
            ..ParseStats::default()
        };

        // Indicator names are shared by every block
        let indicators: Vec<Option<String>> = (FIRST_DATA_ROW..num_rows)
            .map(|row| {
                let name = cell_text(cell(sheet, row, INDICATOR_COL)).trim().to_string();
                (!name.is_empty()).then_some(name)
            })
            .collect();
        stats.empty_indicator_rows = indicators.iter().filter(|name| name.is_none()).count();

        for block in 0..num_blocks {
            let start = 1 + block * self.block_width;
            let end = start + self.block_width;

            let authority = cell_text(cell(sheet, AUTHORITY_ROW, start))
                .trim()
                .to_string();
            if authority.is_empty() {
                if self.empty_authority == EmptyAuthorityPolicy::Reject {
                    return Err(MalformedLayoutError::EmptyAuthority {
                        block: block + 1,
                        column: column_name(start),
                    });
                }
                warn!(
                    "Block {} (column {}) has no authority name, rows tagged with empty authority",
                    block + 1,
                    column_name(start)
                );
                stats.empty_authorities += 1;
            }

            let years: Vec<Option<Year>> = (start..end)
                .map(|col| {
                    let year = coerce_year(cell(sheet, YEAR_ROW, col));
                    if year.is_none() {
                        debug!(
                            "Skipping column {} of block '{}': year label {:?} is not numeric",
                            column_name(col),
                            authority,
                            cell_text(cell(sheet, YEAR_ROW, col))
                        );
                        stats.year_labels_skipped += 1;
                    }
                    year
                })
                .collect();

            for (offset, indicator) in indicators.iter().enumerate() {
                let row = FIRST_DATA_ROW + offset;
                let Some(indicator) = indicator else {
                    continue;
                };

                for (col, year) in (start..end).zip(years.iter()) {
                    let Some(year) = *year else {
                        continue;
                    };
                    let Some(value) = coerce_value(cell(sheet, row, col)) else {
                        stats.blank_values_skipped += 1;
                        continue;
                    };

                    rows.push(ForecastRow {
                        indicator: indicator.clone(),
                        year,
                        value,
                        authority: authority.clone(),
                    });
                }
            }
        }

        stats.rows_emitted = rows.len();
        debug!(
            "Parsed {} blocks into {} rows ({} blank values, {} non-numeric year labels skipped)",
            stats.blocks, stats.rows_emitted, stats.blank_values_skipped, stats.year_labels_skipped
        );

        Ok((rows, stats))
    }

    /// Check the sheet size against the block layout, returning the block count
    fn validate_geometry(
        &self,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<usize, MalformedLayoutError> {
        if self.block_width == 0 {
            return Err(MalformedLayoutError::InvalidBlockWidth(self.block_width));
        }
        if num_rows < FIRST_DATA_ROW + 1 {
            return Err(MalformedLayoutError::TooFewRows { rows: num_rows });
        }

        let required = 1 + self.block_width;
        if num_cols < required {
            return Err(MalformedLayoutError::TooFewColumns {
                columns: num_cols,
                required,
                block_width: self.block_width,
            });
        }

        let value_columns = num_cols - 1;
        let remainder = value_columns % self.block_width;
        if remainder != 0 {
            return Err(MalformedLayoutError::RaggedBlocks {
                value_columns,
                block_width: self.block_width,
                remainder,
            });
        }

        Ok(value_columns / self.block_width)
    }
}

/// Parse `sheet` with the default empty-authority policy
pub fn parse(sheet: &RawSheet, block_width: usize) -> Result<Vec<ForecastRow>, MalformedLayoutError> {
    BlockParser::new(block_width).parse(sheet)
}

/// Sheet size counted from A1, so leading blank rows/columns keep their positions
fn sheet_size(sheet: &RawSheet) -> (usize, usize) {
    match sheet.end() {
        Some((row, col)) => (row as usize + 1, col as usize + 1),
        None => (0, 0),
    }
}

/// Spreadsheet column letters for a 0-based column index (0 -> "A", 26 -> "AA")
pub fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn cell(sheet: &RawSheet, row: usize, col: usize) -> Option<&Data> {
    sheet.get_value((row as u32, col as u32))
}
