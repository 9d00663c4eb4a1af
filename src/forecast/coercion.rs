/// Cell coercion helpers for forecast sheets
///
/// Every helper is best-effort: a cell that cannot be converted yields an empty
/// string or `None`, never an error. Callers decide what a failed coercion means.
use calamine::Data;

use crate::forecast::year::Year;

/// Render a raw cell as text.
///
/// Numbers use their shortest decimal form, so a year typed as a number (`2023.0`)
/// and one typed as text (`"2023"`) produce the same label.
pub fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.clone(),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::DateTime(dt)) => dt
            .as_datetime()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => s.clone(),
        Some(Data::Error(_)) | Some(Data::Empty) | None => String::new(),
    }
}

/// Coerce a year label to a numeric year.
///
/// Accepts anything whose text form parses as a finite number ("2024", "2024.0",
/// " 2025 ", "2023.5"). Labels such as "2024p" or "Utfall" yield `None`.
pub fn coerce_year(cell: Option<&Data>) -> Option<Year> {
    let text = cell_text(cell);
    parse_number(text.trim()).and_then(Year::new)
}

/// Coerce a data cell to a forecast value.
///
/// Blank, error, boolean and date cells are missing values.
pub fn coerce_value(cell: Option<&Data>) -> Option<f64> {
    match cell {
        Some(Data::Float(f)) if f.is_finite() => Some(*f),
        Some(Data::Int(i)) => Some(*i as f64),
        Some(Data::String(s)) => parse_number(s.trim()),
        _ => None,
    }
}

/// Parse a trimmed numeric string, accepting a decimal comma ("1,5").
///
/// A comma is read as a decimal separator only when it is the sole separator and
/// is not followed by exactly three digits; "1,234" and "1.234,5" could be
/// thousands groupings and are not numbers here.
fn parse_number(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }

    let parsed = match text.parse::<f64>() {
        Ok(number) => number,
        Err(_) => {
            let (whole, fraction) = text.split_once(',')?;
            let grouping = fraction.len() == 3 && fraction.bytes().all(|b| b.is_ascii_digit());
            if fraction.contains(',') || text.contains('.') || grouping {
                return None;
            }
            format!("{whole}.{fraction}").parse::<f64>().ok()?
        }
    };

    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn test_cell_text_numbers_use_shortest_form() {
        assert_eq!(cell_text(Some(&Data::Float(2023.0))), "2023");
        assert_eq!(cell_text(Some(&Data::Float(1.25))), "1.25");
        assert_eq!(cell_text(Some(&Data::Int(2024))), "2024");
    }

    #[test]
    fn test_cell_text_missing_cells_are_empty() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&Data::Empty)), "");
        assert_eq!(cell_text(Some(&Data::Error(CellErrorType::NA))), "");
    }

    #[test]
    fn test_coerce_year_accepts_text_and_numbers() {
        assert_eq!(coerce_year(Some(&Data::String("2023".into()))), Some(Year::from(2023)));
        assert_eq!(coerce_year(Some(&Data::String(" 2025 ".into()))), Some(Year::from(2025)));
        assert_eq!(coerce_year(Some(&Data::String("2024.0".into()))), Some(Year::from(2024)));
        assert_eq!(coerce_year(Some(&Data::Float(2026.0))), Some(Year::from(2026)));
        assert_eq!(coerce_year(Some(&Data::Int(2027))), Some(Year::from(2027)));
    }

    #[test]
    fn test_coerce_year_rejects_non_numeric_labels() {
        assert_eq!(coerce_year(Some(&Data::String("2024p".into()))), None);
        assert_eq!(coerce_year(Some(&Data::String("Utfall".into()))), None);
        assert_eq!(coerce_year(Some(&Data::String("".into()))), None);
        assert_eq!(coerce_year(Some(&Data::Bool(true))), None);
        assert_eq!(coerce_year(Some(&Data::Empty)), None);
        assert_eq!(coerce_year(None), None);
    }

    #[test]
    fn test_coerce_year_keeps_fractional_years() {
        assert_eq!(coerce_year(Some(&Data::Float(2023.5))), Year::new(2023.5));
        assert_eq!(
            coerce_year(Some(&Data::String("2023.5".into()))),
            Year::new(2023.5)
        );
        assert_eq!(coerce_year(Some(&Data::Float(f64::NAN))), None);
    }

    #[test]
    fn test_coerce_value_numeric_cells() {
        assert_eq!(coerce_value(Some(&Data::Float(2.4))), Some(2.4));
        assert_eq!(coerce_value(Some(&Data::Int(-1))), Some(-1.0));
        assert_eq!(coerce_value(Some(&Data::Float(f64::NAN))), None);
    }

    #[test]
    fn test_coerce_value_text_cells() {
        assert_eq!(coerce_value(Some(&Data::String(" 3.1 ".into()))), Some(3.1));
        assert_eq!(coerce_value(Some(&Data::String("1,5".into()))), Some(1.5));
        assert_eq!(coerce_value(Some(&Data::String("   ".into()))), None);
        assert_eq!(coerce_value(Some(&Data::String("n/a".into()))), None);
        assert_eq!(coerce_value(Some(&Data::String("-0,25".into()))), Some(-0.25));
    }

    #[test]
    fn test_coerce_value_ambiguous_commas_are_missing() {
        assert_eq!(coerce_value(Some(&Data::String("1,234".into()))), None);
        assert_eq!(coerce_value(Some(&Data::String("1,2,3".into()))), None);
        assert_eq!(coerce_value(Some(&Data::String("1.234,5".into()))), None);
        assert_eq!(coerce_value(Some(&Data::String(",".into()))), None);
    }

    #[test]
    fn test_coerce_value_missing_cells() {
        assert_eq!(coerce_value(None), None);
        assert_eq!(coerce_value(Some(&Data::Empty)), None);
        assert_eq!(coerce_value(Some(&Data::Error(CellErrorType::NA))), None);
        assert_eq!(coerce_value(Some(&Data::Bool(false))), None);
    }
}
