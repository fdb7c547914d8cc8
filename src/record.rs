use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// Accepted layouts for `registered` once its separator space is stripped.
/// None of them carries a zone, so they are read as UTC.
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%d%H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const OFFSET_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// A user as it arrives in the asset, `registered` and `balance` still loosely typed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub name: String,
    pub age: u32,
    pub registered: String,
    pub email: String,
    pub balance: RawBalance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBalance {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub name: String,
    pub age: u32,
    /// `None` when the source text could not be parsed.
    pub registered: Option<DateTime<Utc>>,
    pub email: String,
    /// `NaN` when the source text is not a number.
    pub balance: f64,
}

pub fn parse_registered(text: &str) -> Option<DateTime<Utc>> {
    let stripped = text.replacen(' ', "", 1);
    // Only the separator space is dropped, any other whitespace is malformed.
    if stripped.contains(char::is_whitespace) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_str(&stripped, OFFSET_LAYOUT) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&stripped, layout).ok())
        .map(|naive| naive.and_utc())
}

/// Plain decimal text only, `inf` and `nan` spellings are not balances.
pub fn parse_balance(text: &str) -> f64 {
    let text = text.replace(',', "");
    let text = text.trim();
    let plain = text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+'));
    if !plain {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

pub fn normalize(raw: RawUser) -> UserRecord {
    let registered = parse_registered(&raw.registered);
    if registered.is_none() {
        warn!(
            "Invalid registration date '{}' for '{}'",
            raw.registered, raw.name
        );
    }

    let balance = match &raw.balance {
        RawBalance::Text(text) => parse_balance(text),
        RawBalance::Number(value) => *value,
    };
    if balance.is_nan() {
        warn!("Invalid balance {:?} for '{}'", raw.balance, raw.name);
    }

    UserRecord {
        name: raw.name,
        age: raw.age,
        registered,
        email: raw.email,
        balance,
    }
}
