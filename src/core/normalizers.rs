//! Pure field normalizers. They never fail: unparseable input maps to a neutral
//! fallback (`""`, `0`, `00:00:00`) that callers treat as "unknown".

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Fixed local offset of the source data (America/Recife, no DST).
/// Applied as a constant, no timezone database is consulted.
pub const LOCAL_OFFSET: &str = "-03:00";

pub const MIDNIGHT: &str = "00:00:00";

/// Incident-count columns of the Recife accident datasets.
pub const KNOWN_COUNT_FIELDS: [&str; 11] = [
    "auto",
    "moto",
    "ciclom",
    "ciclista",
    "pedestre",
    "onibus",
    "caminhao",
    "viatura",
    "outros",
    "vitimas",
    "vitimasfatais",
];

// 日期格式：巴西資料以日/月/年為主
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%d/%m/%y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

// chrono 的 %Y 也吃一到兩位數的年份，這種結果一律不採用
const MIN_YEAR: i32 = 100;

static STRICT_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d$").expect("static time pattern")
});

fn parse_lenient_date(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    let datetime = DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(text, fmt)
            .ok()
            .map(|dt| dt.date())
            .filter(|date| date.year() >= MIN_YEAR)
    });
    if datetime.is_some() {
        return datetime;
    }

    // Drop a trailing time part the formats above did not cover ("01/03/2024 14h").
    let date_part = text.split(['T', ' ']).next().unwrap_or(text);
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(date_part, fmt)
            .ok()
            .filter(|date| date.year() >= MIN_YEAR)
    })
}

/// `YYYY-MM-DD`, or `""` when the text is not a recognizable date.
pub fn normalize_date(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    parse_lenient_date(trimmed)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn pad2(part: &str) -> String {
    format!("{:0>2}", part.trim())
}

/// Textual `HH:mm:ss` padding. Values are not range-checked (`99:99:99` passes).
pub fn normalize_time(text: &str) -> String {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() < 2 {
        return String::new();
    }

    let seconds = parts.get(2).map(|s| pad2(s)).unwrap_or_else(|| "00".to_string());
    format!("{}:{}:{}", pad2(parts[0]), pad2(parts[1]), seconds)
}

/// Strict `HH:mm:ss` with hour 00-23 and minute/second 00-59, zero padded.
pub fn is_valid_time(text: &str) -> bool {
    STRICT_TIME.is_match(text)
}

/// `{date}T{time}-03:00`. An invalid time falls back to midnight with a warning.
pub fn combine_date_time(date_text: &str, time_text: Option<&str>) -> String {
    let date = date_text.split('T').next().unwrap_or_default().trim();

    let time = match time_text {
        None => MIDNIGHT.to_string(),
        Some(raw) => {
            let candidate = raw.split('.').next().unwrap_or_default().trim();
            if is_valid_time(candidate) {
                candidate.to_string()
            } else {
                tracing::warn!(
                    "⚠️ Invalid time {:?} for date {:?}, using {}",
                    raw,
                    date,
                    MIDNIGHT
                );
                MIDNIGHT.to_string()
            }
        }
    };

    format!("{}T{}{}", date, time, LOCAL_OFFSET)
}

/// Decimal comma aware float parsing. Always returns a finite number, `0` on failure.
pub fn parse_numeric_field(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

pub fn is_numeric_field(key: &str) -> bool {
    KNOWN_COUNT_FIELDS.contains(&key) || key.starts_with("num_") || key.ends_with("_count")
}
