use calamine::DataType;
use clap::{Parser, ValueEnum};
use forecast_service::forecast::{BlockParser, EmptyAuthorityPolicy, ForecastFilter, ForecastTable};
use forecast_service::importers::WorkbookLoader;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Row counts per authority and indicator
    Summary,
    /// Every parsed row as JSON
    Json,
    /// Top-left corner of the raw sheet, before parsing
    Layout,
}

#[derive(Parser)]
#[command(name = "forecast-report")]
#[command(about = "Inspect a blocked forecast workbook and its normalized rows", long_about = None)]
struct Cli {
    /// Path to the forecast workbook
    #[arg(long, env = "FORECAST_WORKBOOK_PATH", default_value = "Prognoser.xlsx")]
    file: PathBuf,

    /// Sheet holding the forecast blocks
    #[arg(long, env = "FORECAST_SHEET_NAME", default_value = "Data")]
    sheet: String,

    /// Columns per authority block
    #[arg(long, env = "FORECAST_BLOCK_WIDTH", default_value = "5")]
    block_width: usize,

    /// Fail on blocks without an authority name instead of warning
    #[arg(long)]
    strict_authorities: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "summary")]
    format: Format,

    /// Only report rows for this indicator
    #[arg(long)]
    indicator: Option<String>,

    /// Rows and columns to show in layout mode
    #[arg(long, default_value = "12")]
    preview: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let policy = if cli.strict_authorities {
        EmptyAuthorityPolicy::Reject
    } else {
        EmptyAuthorityPolicy::Warn
    };
    let loader = WorkbookLoader::new(&cli.file)
        .with_sheet_name(&cli.sheet)
        .with_parser(BlockParser::new(cli.block_width).with_empty_authority_policy(policy));

    if let Format::Layout = cli.format {
        return print_layout(&loader, cli.preview);
    }

    let start = Instant::now();
    let table = loader.load()?;
    info!("Loaded {} rows in {:?}", table.len(), start.elapsed());

    let table = match &cli.indicator {
        Some(indicator) => table.filter(&ForecastFilter::indicator(indicator.as_str())),
        None => table,
    };

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(table.rows())?),
        _ => print_summary(&table),
    }

    Ok(())
}

fn print_layout(loader: &WorkbookLoader, preview: usize) -> Result<(), Box<dyn std::error::Error>> {
    let sheet = loader.read_sheet()?;

    println!("Sheet '{}' in {}", loader.sheet_name(), loader.workbook_path().display());
    println!("Last cell: {:?}", sheet.end());
    println!("{}", "=".repeat(100));

    let (rows, cols) = sheet
        .end()
        .map(|(r, c)| (r as usize + 1, c as usize + 1))
        .unwrap_or((0, 0));
    let block_width = loader.parser().block_width();

    for row in 0..rows.min(preview) {
        print!("Row {:3}: ", row + 1);
        for col in 0..cols.min(preview) {
            if col > 0 && block_width > 0 && (col - 1) % block_width == 0 {
                print!("| ");
            }
            match sheet.get_value((row as u32, col as u32)) {
                Some(cell) if !cell.is_empty() => print!("[{cell}] "),
                _ => print!("[empty] "),
            }
        }
        println!();
    }

    if cols > 1 && block_width > 0 {
        let value_columns = cols - 1;
        println!("{}", "=".repeat(100));
        println!(
            "{} value columns -> {} blocks of {} ({} left over)",
            value_columns,
            value_columns / block_width,
            block_width,
            value_columns % block_width
        );
    }

    Ok(())
}

fn print_summary(table: &ForecastTable) {
    for line in summary_lines(table) {
        println!("{line}");
    }
}

/// Row counts per authority and indicator, one output line each
fn summary_lines(table: &ForecastTable) -> Vec<String> {
    let mut lines = vec![format!("Rows: {}", table.len())];
    if let Some((first, last)) = table.year_range() {
        lines.push(format!("Years: {first}-{last}"));
    }

    let mut by_authority: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_indicator: BTreeMap<&str, usize> = BTreeMap::new();
    for row in table.rows() {
        *by_authority.entry(row.authority.as_str()).or_default() += 1;
        *by_indicator.entry(row.indicator.as_str()).or_default() += 1;
    }

    lines.push(String::new());
    lines.push(format!("Authorities ({}):", by_authority.len()));
    for (authority, count) in &by_authority {
        let name = if authority.is_empty() { "(unnamed)" } else { *authority };
        lines.push(format!("  {name:<40} {count:>6}"));
    }

    lines.push(String::new());
    lines.push(format!("Indicators ({}):", by_indicator.len()));
    for (indicator, count) in &by_indicator {
        lines.push(format!("  {indicator:<40} {count:>6}"));
    }

    lines
}
