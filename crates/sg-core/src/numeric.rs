/// Format like C's `%.<precision>G`: `precision` significant digits,
/// scientific notation for very small or large magnitudes, trailing zeros
/// removed.
pub fn format_g(value: f64, precision: usize) -> String {
    let p = precision.max(1);
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }

    // Rounding to `p` digits may bump the exponent (9.99995 -> 1.0000e1),
    // so the exponent is read back from the rounded form.
    let sci = format!("{:.*e}", p - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}E{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_g_matches_printf() {
        assert_eq!(format_g(9.4448, 5), "9.4448");
        assert_eq!(format_g(123456.0, 5), "1.2346E+05");
        assert_eq!(format_g(100.0, 5), "100");
        assert_eq!(format_g(0.0001, 5), "0.0001");
        assert_eq!(format_g(0.00001, 5), "1E-05");
        assert_eq!(format_g(-2.5, 4), "-2.5");
        assert_eq!(format_g(99999.5, 5), "1E+05");
        assert_eq!(format_g(0.0, 4), "0");
    }
}
