use chrono::{DateTime, Utc};

use crate::record::UserRecord;
use crate::table::Column;

pub const MISSING_VALUE: &str = "∅";

/// `DD-MM-YYYY HH:MM:SS UTC`. Components are read in UTC, so the host
/// time zone never leaks into the output.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%d-%m-%Y %H:%M:%S UTC").to_string()
}

/// Two decimals with `,` as thousands separator.
pub fn format_balance(balance: f64) -> String {
    if !balance.is_finite() {
        return balance.to_string();
    }
    let fixed = format!("{:.2}", balance.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, chr) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(chr);
    }

    let sign = if balance < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

pub fn format_cell(record: &UserRecord, column: Column) -> String {
    match column {
        Column::Name => record.name.clone(),
        Column::Age => record.age.to_string(),
        Column::Registered => record
            .registered
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| MISSING_VALUE.to_string()),
        Column::Email => record.email.clone(),
        Column::Balance => format_balance(record.balance),
    }
}
