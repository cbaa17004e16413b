//! Display helpers for the board. Derived strings are recomputed on demand
//! and never stored back on the token.

pub fn format_price(value: f64) -> String {
    if value < 0.00001 {
        format!("${:.2e}", value)
    } else if value < 0.01 {
        format!("${:.6}", value)
    } else if value < 1.0 {
        format!("${:.4}", value)
    } else {
        format!("${:.2}", value)
    }
}

/// Compact cash amount: 950.00, 12.3K, 4.5M, 1.2B
pub fn format_cash(n: f64) -> String {
    if n < 1e3 {
        format!("{:.2}", n)
    } else if n < 1e6 {
        format!("{}K", trim_one_decimal(n / 1e3))
    } else if n < 1e9 {
        format!("{}M", trim_one_decimal(n / 1e6))
    } else {
        format!("{}B", trim_one_decimal(n / 1e9))
    }
}

fn trim_one_decimal(v: f64) -> String {
    let s = format!("{:.1}", v);
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

/// Fraction in [0, 1] as a percentage with one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn format_age(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / 1440)
    }
}

pub fn age_minutes(created_at_ts: i64, now_ms: i64) -> i64 {
    (now_ms - created_at_ts).max(0) / 60_000
}

pub fn age_human_readable(created_at_ts: i64, now_ms: i64) -> String {
    format_age(age_minutes(created_at_ts, now_ms))
}

/// Shortens an address to `abcd...wxyz`.
pub fn format_address(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() <= 8 {
        return addr.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_tiers() {
        assert_eq!(format_price(0.000001234), "$1.23e-6");
        assert_eq!(format_price(0.00123456), "$0.001235");
        assert_eq!(format_price(0.5), "$0.5000");
        assert_eq!(format_price(12.346), "$12.35");
    }

    #[test]
    fn test_format_cash() {
        assert_eq!(format_cash(950.0), "950.00");
        assert_eq!(format_cash(12_345.0), "12.3K");
        assert_eq!(format_cash(5_000.0), "5K");
        assert_eq!(format_cash(4_500_000.0), "4.5M");
        assert_eq!(format_cash(1_200_000_000.0), "1.2B");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(0), "0m");
        assert_eq!(format_age(59), "59m");
        assert_eq!(format_age(125), "2h");
        assert_eq!(format_age(3000), "2d");
        assert_eq!(age_human_readable(0, 45 * 60_000), "45m");
        assert_eq!(age_minutes(10_000, 0), 0);
    }

    #[test]
    fn test_format_address_and_percent() {
        assert_eq!(format_address("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"), "7xKX...gAsU");
        assert_eq!(format_address("short"), "short");
        assert_eq!(format_percent(0.8123), "81.2%");
    }
}
