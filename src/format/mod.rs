// src/format/mod.rs

//! Number formatting for document values.

/// Significant digits written for every value in the document.
pub const SIGNIFICANT_DIGITS: usize = 6;

/// Formats `value` in general notation with `precision` significant digits,
/// matching C's `%g`: fixed notation when the decimal exponent lies in
/// `-4..precision`, scientific otherwise, trailing zeros removed.
///
/// ```
/// use vfm_export::format::format_general;
///
/// assert_eq!(format_general(0.1, 6), "0.1");
/// assert_eq!(format_general(1234567.0, 6), "1.23457e+06");
/// assert_eq!(format_general(0.00001, 6), "1e-05");
/// ```
pub fn format_general(value: f64, precision: usize) -> String {
    let precision = precision.max(1);

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return text.to_string();
    }
    if value == 0.0 {
        let text = if value.is_sign_negative() { "-0" } else { "0" };
        return text.to_string();
    }

    // The exponent has to come from the rounded value: 9.9999996 rounds up
    // to 1.00000e1 and is then written in fixed notation as "10".
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return scientific.clone(),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_fraction_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_fraction_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// Joins `values` with commas, each at [`SIGNIFICANT_DIGITS`].
pub fn format_components(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_general(*v, SIGNIFICANT_DIGITS))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_notation() {
        assert_eq!(format_general(2.0, 6), "2");
        assert_eq!(format_general(-1.5, 6), "-1.5");
        assert_eq!(format_general(0.1, 6), "0.1");
        assert_eq!(format_general(100000.0, 6), "100000");
        assert_eq!(format_general(123456.7, 6), "123457");
        assert_eq!(format_general(0.0001, 6), "0.0001");
        assert_eq!(format_general(0.000123456789, 6), "0.000123457");
        assert_eq!(format_general(3.14159265, 6), "3.14159");
        assert_eq!(format_general(1.0 / 3.0, 6), "0.333333");
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(format_general(1e6, 6), "1e+06");
        assert_eq!(format_general(1234567.0, 6), "1.23457e+06");
        assert_eq!(format_general(0.00001, 6), "1e-05");
        assert_eq!(format_general(-2.5e-7, 6), "-2.5e-07");
        assert_eq!(format_general(6.02214076e23, 6), "6.02214e+23");
        assert_eq!(format_general(1e-300, 6), "1e-300");
    }

    #[test]
    fn test_rounding_carries_into_exponent() {
        assert_eq!(format_general(9.9999996, 6), "10");
        assert_eq!(format_general(999999.6, 6), "1e+06");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(format_general(0.0, 6), "0");
        assert_eq!(format_general(-0.0, 6), "-0");
        assert_eq!(format_general(f64::NAN, 6), "nan");
        assert_eq!(format_general(f64::INFINITY, 6), "inf");
        assert_eq!(format_general(f64::NEG_INFINITY, 6), "-inf");
    }

    #[test]
    fn test_components_are_joined_without_spaces() {
        assert_eq!(format_components(&[0.0, -0.05, 1.25e-6]), "0,-0.05,1.25e-06");
        assert_eq!(format_components(&[]), "");
    }
}
