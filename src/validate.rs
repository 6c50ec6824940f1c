//! Form validation and display formatting.
//!
//! These checks run before a payload is sent; the backend stays the
//! authority and may still reject input that passes here.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const PHONE_MIN_DIGITS: usize = 10;

pub const COLLEGE_TYPES: [&str; 4] = ["University", "College", "Institute", "Academy"];
pub const BOOKING_STATUSES: [&str; 3] = ["pending", "approved", "rejected"];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+]?[\d\s\-()]+$").expect("phone pattern is valid"));

#[must_use]
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[must_use]
pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LENGTH
}

/// Digits, spaces, dashes and parentheses with an optional leading `+`,
/// carrying at least ten digits.
#[must_use]
pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone) && digit_count(phone) >= PHONE_MIN_DIGITS
}

#[must_use]
pub fn validate_required(value: &str) -> bool {
    !value.trim().is_empty()
}

#[must_use]
pub fn validate_rating(rating: u8) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

/// `5551234567` -> `(555) 123-4567`; anything without exactly ten digits is
/// returned unchanged.
#[must_use]
pub fn format_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != PHONE_MIN_DIGITS {
        return phone.to_owned();
    }
    format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
}

/// Whole-dollar USD amount with thousands separators, e.g. `$52,000`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let rounded = amount.round() as i64;
    let sign = if rounded < 0 { "-" } else { "" };
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}")
}

/// Long US date (`March 5, 2024`) from an RFC 3339 timestamp or `YYYY-MM-DD`.
/// Unparseable input is returned unchanged.
#[must_use]
pub fn format_date(raw: &str) -> String {
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"));
    match date {
        Ok(date) => date.format("%B %-d, %Y").to_string(),
        Err(_) => raw.to_owned(),
    }
}
