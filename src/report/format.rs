use num_format::{Locale, ToFormattedString};

use super::rows::Cell;

const MAX_FRACTION_DIGITS: usize = 3;

/// Formats a number for display with French grouping ("1 234 567,5").
/// Display only; exports keep the raw value.
pub fn format_number(value: f64) -> String {
    let locale = Locale::fr;
    let scale = 10f64.powi(MAX_FRACTION_DIGITS as i32);
    let rounded = (value.abs() * scale).round() / scale;

    let integer = rounded.trunc() as u64;
    let mut out = String::new();
    if value < 0.0 && rounded != 0.0 {
        out.push_str(locale.minus_sign());
    }
    out.push_str(&integer.to_formatted_string(&locale));

    let fraction = format!("{:.*}", MAX_FRACTION_DIGITS, rounded.fract());
    let digits = fraction
        .trim_start_matches('0')
        .trim_start_matches('.')
        .trim_end_matches('0');
    if !digits.is_empty() {
        out.push_str(locale.decimal());
        out.push_str(digits);
    }
    out
}

/// Display text of one cell.
pub fn display_cell(cell: &Cell) -> String {
    match cell {
        Cell::Position(p) => p.to_string(),
        Cell::Text(text) => text.clone(),
        Cell::Number(n) => format_number(*n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NNBSP: char = '\u{202f}';

    #[test]
    fn test_format_number_groups_thousands() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1234.0), format!("1{NNBSP}234"));
        assert_eq!(
            format_number(1_234_567.0),
            format!("1{NNBSP}234{NNBSP}567")
        );
    }

    #[test]
    fn test_format_number_fraction_digits() {
        assert_eq!(format_number(120.5), "120,5");
        assert_eq!(format_number(0.125), "0,125");
        assert_eq!(format_number(2.0004), "2");
        assert_eq!(format_number(1999.9996), format!("2{NNBSP}000"));
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-1500.25), format!("-1{NNBSP}500,25"));
        assert_eq!(format_number(-0.0001), "0");
    }

    #[test]
    fn test_display_cell() {
        assert_eq!(display_cell(&Cell::Position(3)), "3");
        assert_eq!(display_cell(&Cell::Text("Hilux".into())), "Hilux");
        assert_eq!(display_cell(&Cell::Number(5200.0)), format!("5{NNBSP}200"));
    }
}
