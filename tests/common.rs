#![allow(dead_code)]

use calamine::{Data, Range};
use forecast_service::forecast::RawSheet;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

/// A fixture cell, written either into an in-memory sheet or a real workbook
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

pub fn num(value: f64) -> Cell {
    Cell::Number(value)
}

impl Cell {
    pub fn to_data(&self) -> Data {
        match self {
            Cell::Text(s) => Data::String(s.clone()),
            Cell::Number(n) => Data::Float(*n),
            Cell::Blank => Data::Empty,
        }
    }
}

/// Build an in-memory sheet from A1
pub fn raw_sheet(grid: &[Vec<Cell>]) -> RawSheet {
    let height = grid.len() as u32;
    let width = grid.iter().map(|row| row.len()).max().unwrap_or(0) as u32;
    if height == 0 || width == 0 {
        return Range::empty();
    }

    let mut range = Range::new((0, 0), (height - 1, width - 1));
    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            range.set_value((r as u32, c as u32), cell.to_data());
        }
    }
    range
}

/// Grid of `authorities.len()` blocks, each with the same year labels, and one
/// row per indicator. Values are `block * 100 + row * 10 + column`.
pub fn block_grid(authorities: &[&str], years: &[&str], indicators: &[&str]) -> Vec<Vec<Cell>> {
    let width = years.len();
    let mut authority_row = vec![Cell::Blank];
    let mut year_row = vec![Cell::Blank];
    for authority in authorities {
        authority_row.push(text(authority));
        authority_row.extend(std::iter::repeat(Cell::Blank).take(width - 1));
        year_row.extend(years.iter().map(|y| text(y)));
    }

    let mut grid = vec![authority_row, year_row];
    for (row, indicator) in indicators.iter().enumerate() {
        let mut cells = vec![text(indicator)];
        for block in 0..authorities.len() {
            for col in 0..width {
                cells.push(num((block * 100 + row * 10 + col) as f64));
            }
        }
        grid.push(cells);
    }
    grid
}

/// Write `grid` as the only sheet of a new xlsx workbook
pub fn write_workbook(path: &Path, sheet_name: &str, grid: &[Vec<Cell>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .expect("Failed to name fixture sheet");

    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(s) => {
                    worksheet
                        .write_string(r as u32, c as u16, s.as_str())
                        .expect("Failed to write fixture text");
                }
                Cell::Number(n) => {
                    worksheet
                        .write_number(r as u32, c as u16, *n)
                        .expect("Failed to write fixture number");
                }
                Cell::Blank => {}
            }
        }
    }

    workbook.save(path).expect("Failed to save fixture workbook");
}

/// Two authorities in blocks of 3 columns.
///
/// - KI: years 2024-2026, KI/Arbetslöshet/2026 blank
/// - Riksbanken: third year label "2026p" is not numeric, KPIF/2025 blank
///
/// Parses to 13 rows: 8 for KI, 5 for Riksbanken.
pub fn sample_grid() -> Vec<Vec<Cell>> {
    vec![
        vec![
            Cell::Blank,
            text("KI"),
            Cell::Blank,
            Cell::Blank,
            text("Riksbanken"),
            Cell::Blank,
            Cell::Blank,
        ],
        vec![
            Cell::Blank,
            text("2024"),
            text("2025"),
            text("2026"),
            num(2024.0),
            num(2025.0),
            text("2026p"),
        ],
        vec![
            text("BNP"),
            num(1.0),
            num(2.0),
            num(2.5),
            num(0.8),
            num(1.6),
            num(2.2),
        ],
        vec![
            text("KPIF"),
            num(2.8),
            num(2.1),
            num(2.0),
            num(3.0),
            Cell::Blank,
            num(2.0),
        ],
        vec![
            text("Arbetslöshet"),
            num(8.5),
            num(8.2),
            Cell::Blank,
            num(8.6),
            num(8.4),
            num(8.0),
        ],
    ]
}

pub const SAMPLE_BLOCK_WIDTH: usize = 3;
pub const SAMPLE_ROWS: usize = 13;

/// Write the sample workbook into `dir` with sheet "Data"
pub fn sample_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("Prognoser.xlsx");
    write_workbook(&path, "Data", &sample_grid());
    path
}
