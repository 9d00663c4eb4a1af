use calamine::{open_workbook_auto, Reader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::forecast::{BlockParser, EmptyAuthorityPolicy, ForecastTable, MalformedLayoutError, RawSheet};

/// Sheet holding the forecast blocks in the published workbook
pub const DEFAULT_SHEET_NAME: &str = "Data";

#[derive(Error, Debug)]
pub enum ForecastLoadError {
    #[error("Failed to read source file {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Failed to read sheet {sheet}: {msg}")]
    SheetRead { sheet: String, msg: String },

    #[error("Malformed forecast layout: {0}")]
    Layout(#[from] MalformedLayoutError),
}

impl ForecastLoadError {
    /// Stable identifier for API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastLoadError::Source { .. } => "source_unavailable",
            ForecastLoadError::WorkbookOpen(_) => "workbook_open",
            ForecastLoadError::SheetNotFound(_) => "sheet_not_found",
            ForecastLoadError::SheetRead { .. } => "sheet_read",
            ForecastLoadError::Layout(_) => "malformed_layout",
        }
    }
}

/// Reads the forecast sheet from a workbook and parses it into a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookLoader {
    workbook_path: PathBuf,
    sheet_name: String,
    parser: BlockParser,
}

impl WorkbookLoader {
    pub fn new(workbook_path: impl Into<PathBuf>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            parser: BlockParser::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let policy = if config.reject_empty_authorities {
            EmptyAuthorityPolicy::Reject
        } else {
            EmptyAuthorityPolicy::Warn
        };

        Self::new(config.workbook_path.clone())
            .with_sheet_name(&config.sheet_name)
            .with_parser(BlockParser::new(config.block_width).with_empty_authority_policy(policy))
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    pub fn with_parser(mut self, parser: BlockParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn workbook_path(&self) -> &Path {
        &self.workbook_path
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn parser(&self) -> &BlockParser {
        &self.parser
    }

    /// Read the configured sheet into memory
    ///
    /// The workbook is dropped before this returns, so the file handle is released
    /// whether or not the read succeeded. This is synchronous, async callers should
    /// use spawn_blocking.
    #[instrument(skip(self), fields(path = %self.workbook_path.display(), sheet = %self.sheet_name))]
    pub fn read_sheet(&self) -> Result<RawSheet, ForecastLoadError> {
        let mut workbook = open_workbook_auto(&self.workbook_path)
            .map_err(|e| ForecastLoadError::WorkbookOpen(e.to_string()))?;

        let sheet_names = workbook.sheet_names();
        debug!("Workbook has sheets: {:?}", sheet_names);
        if !sheet_names.iter().any(|name| name == &self.sheet_name) {
            return Err(ForecastLoadError::SheetNotFound(self.sheet_name.clone()));
        }

        let range = workbook
            .worksheet_range(&self.sheet_name)
            .map_err(|e| ForecastLoadError::SheetRead {
                sheet: self.sheet_name.clone(),
                msg: e.to_string(),
            })?;

        debug!("Sheet '{}' spans {:?}", self.sheet_name, range.end());
        Ok(range)
    }

    /// Read and parse the forecast sheet
    pub fn load(&self) -> Result<ForecastTable, ForecastLoadError> {
        info!(
            "Loading forecasts from {} (sheet '{}', block width {})",
            self.workbook_path.display(),
            self.sheet_name,
            self.parser.block_width()
        );

        let sheet = self.read_sheet()?;
        let (rows, stats) = self.parser.parse_with_stats(&sheet)?;

        if stats.empty_authorities > 0 {
            info!(
                "{} block(s) in {} have no authority name",
                stats.empty_authorities,
                self.workbook_path.display()
            );
        }
        info!(
            "Parsed {} forecast rows from {} blocks ({} blank values, {} non-numeric year labels, {} unnamed indicator rows skipped)",
            stats.rows_emitted,
            stats.blocks,
            stats.blank_values_skipped,
            stats.year_labels_skipped,
            stats.empty_indicator_rows
        );

        Ok(ForecastTable::new(rows))
    }
}
