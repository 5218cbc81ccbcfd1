//! Utility functions and helpers

use chrono::{DateTime, Utc};

/// Format a price with thousands separators and four decimals
pub fn format_price(value: f64) -> String {
    let formatted = format!("{:.4}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "0000"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac_part)
}

/// Default file name for tracker exports
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("price_data_{}.json", now.format("%Y%m%d_%H%M%S"))
}
