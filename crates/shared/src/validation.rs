//! Field validators for portal and back-office forms.
//!
//! Each validator returns the normalized value on success so callers can
//! persist exactly what was checked.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Default earliest booking offset in days.
pub const DEFAULT_MIN_BOOKING_DAYS: i64 = 0;

/// Default latest booking offset in days.
pub const DEFAULT_MAX_BOOKING_DAYS: i64 = 180;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref ZIP_RE: Regex = Regex::new(r"^\d{5}(-\d{4})?$").unwrap();
}

const US_STATES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

fn invalid(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into().into());
    err
}

/// Returns the human-readable message attached to a validation error.
pub fn message_of(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}

/// Validates an email address and returns it trimmed and lower-cased.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(invalid("email_required", "Email address is required"));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(invalid("email_format", "Invalid email format"));
    }
    Ok(email)
}

/// Validates a US phone number and returns its canonical display form.
///
/// Accepts `(123) 456-7890`, `123-456-7890`, `1234567890` and
/// `+11234567890`. Ten digits format as `(123) 456-7890`; eleven digits
/// with a leading country code `1` format as `+1 (123) 456-7890`.
pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    if phone.trim().is_empty() {
        return Err(invalid("phone_required", "Phone number is required"));
    }

    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => Ok(format!(
            "({}) {}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..]
        )),
        11 if digits.starts_with('1') => Ok(format!(
            "+1 ({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..]
        )),
        _ => Err(invalid("phone_format", "Invalid phone number format")),
    }
}

/// Validates a 5-digit or ZIP+4 code.
pub fn validate_zip_code(zip_code: &str) -> Result<String, ValidationError> {
    let zip_code = zip_code.trim();
    if zip_code.is_empty() {
        return Err(invalid("zip_required", "ZIP code is required"));
    }
    if !ZIP_RE.is_match(zip_code) {
        return Err(invalid("zip_format", "Invalid ZIP code format"));
    }
    Ok(zip_code.to_string())
}

/// Validates a two-letter US state code and returns it upper-cased.
pub fn validate_state(state: &str) -> Result<String, ValidationError> {
    let state = state.trim().to_uppercase();
    if state.is_empty() {
        return Err(invalid("state_required", "State is required"));
    }
    if !US_STATES.contains(&state.as_str()) {
        return Err(invalid("state_code", "Invalid state code"));
    }
    Ok(state)
}

/// Validates a `YYYY-MM-DD` service date within `[today + min_days, today + max_days]`.
pub fn validate_service_date(
    date_str: &str,
    min_days: i64,
    max_days: i64,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    if date_str.trim().is_empty() {
        return Err(invalid("service_date_required", "Service date is required"));
    }

    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| invalid("service_date_format", "Invalid date format (use YYYY-MM-DD)"))?;

    if date < today + Duration::days(min_days) {
        return Err(invalid(
            "service_date_too_soon",
            format!("Service date must be at least {} days in advance", min_days),
        ));
    }
    if date > today + Duration::days(max_days) {
        return Err(invalid(
            "service_date_too_far",
            format!("Service date cannot be more than {} days in advance", max_days),
        ));
    }

    Ok(date)
}

/// Validates an `HH:MM` service time against the shop's opening hours.
///
/// Weekdays 08:00-17:00, Saturday 09:00-14:00, closed on Sunday. Both ends
/// are inclusive.
pub fn validate_business_hours(
    time_str: &str,
    date: NaiveDate,
) -> Result<NaiveTime, ValidationError> {
    if time_str.trim().is_empty() {
        return Err(invalid("service_time_required", "Service time is required"));
    }

    let time = NaiveTime::parse_from_str(time_str.trim(), "%H:%M")
        .map_err(|_| invalid("service_time_format", "Invalid time format (use HH:MM)"))?;

    let hours = |open: u32, close: u32| {
        (
            NaiveTime::from_hms_opt(open, 0, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(close, 0, 0).unwrap_or(NaiveTime::MIN),
        )
    };

    match date.weekday() {
        Weekday::Sun => Err(invalid(
            "service_day_closed",
            "Services are not available on Sundays",
        )),
        Weekday::Sat => {
            let (open, close) = hours(9, 14);
            if time < open || time > close {
                return Err(invalid(
                    "service_time_hours",
                    "Saturday service hours are 9:00 AM to 2:00 PM",
                ));
            }
            Ok(time)
        }
        _ => {
            let (open, close) = hours(8, 17);
            if time < open || time > close {
                return Err(invalid(
                    "service_time_hours",
                    "Weekday service hours are 8:00 AM to 5:00 PM",
                ));
            }
            Ok(time)
        }
    }
}

/// Validates that a website begins with an http(s) scheme.
pub fn validate_website(website: &str) -> Result<(), ValidationError> {
    let website = website.trim();
    if website.starts_with("http://") || website.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(
            "website_scheme",
            "Website must begin with http:// or https://",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ZIP code tests
    #[test]
    fn test_validate_zip_code() {
        assert_eq!(validate_zip_code("12345").unwrap(), "12345");
        assert_eq!(validate_zip_code("12345-6789").unwrap(), "12345-6789");
        assert_eq!(validate_zip_code(" 12345 ").unwrap(), "12345");
        assert!(validate_zip_code("1234").is_err());
        assert!(validate_zip_code("abcde").is_err());
        assert!(validate_zip_code("123456").is_err());
        assert!(validate_zip_code("12345-678").is_err());
    }

    #[test]
    fn test_validate_zip_code_messages() {
        assert_eq!(
            message_of(&validate_zip_code("").unwrap_err()),
            "ZIP code is required"
        );
        assert_eq!(
            message_of(&validate_zip_code("1234").unwrap_err()),
            "Invalid ZIP code format"
        );
    }

    // Phone tests
    #[test]
    fn test_validate_phone_normalizes_formats() {
        let canonical = "(123) 456-7890";
        assert_eq!(validate_phone("(123) 456-7890").unwrap(), canonical);
        assert_eq!(validate_phone("1234567890").unwrap(), canonical);
        assert_eq!(validate_phone("123-456-7890").unwrap(), canonical);
        assert_eq!(
            validate_phone("+11234567890").unwrap(),
            format!("+1 {}", canonical)
        );
    }

    #[test]
    fn test_validate_phone_rejects_short_numbers() {
        let err = validate_phone("123").unwrap_err();
        assert_eq!(message_of(&err), "Invalid phone number format");
        assert!(validate_phone("21234567890").is_err());
        assert_eq!(
            message_of(&validate_phone("  ").unwrap_err()),
            "Phone number is required"
        );
    }

    // Email tests
    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert_eq!(
            message_of(&validate_email("").unwrap_err()),
            "Email address is required"
        );
    }

    // State tests
    #[test]
    fn test_validate_state() {
        assert_eq!(validate_state("tx").unwrap(), "TX");
        assert!(validate_state("ZZ").is_err());
        assert!(validate_state("").is_err());
    }

    // Service date tests
    #[test]
    fn test_validate_service_date_range() {
        let today = date(2024, 3, 1);
        assert_eq!(
            validate_service_date("2024-03-10", 0, 180, today).unwrap(),
            date(2024, 3, 10)
        );
        assert!(validate_service_date("2024-02-28", 0, 180, today).is_err());
        assert!(validate_service_date("2025-03-01", 0, 180, today).is_err());
    }

    #[test]
    fn test_validate_service_date_min_days_message() {
        let today = date(2024, 3, 1);
        let err = validate_service_date("2024-03-02", 3, 180, today).unwrap_err();
        assert_eq!(
            message_of(&err),
            "Service date must be at least 3 days in advance"
        );
    }

    #[test]
    fn test_validate_service_date_format() {
        let err = validate_service_date("03/10/2024", 0, 180, date(2024, 3, 1)).unwrap_err();
        assert_eq!(message_of(&err), "Invalid date format (use YYYY-MM-DD)");
    }

    // Business hours tests
    #[test]
    fn test_validate_business_hours_weekday() {
        // 2024-03-04 is a Monday
        let monday = date(2024, 3, 4);
        assert!(validate_business_hours("08:00", monday).is_ok());
        assert!(validate_business_hours("17:00", monday).is_ok());
        assert!(validate_business_hours("07:59", monday).is_err());
        assert!(validate_business_hours("17:01", monday).is_err());
    }

    #[test]
    fn test_validate_business_hours_weekend() {
        let saturday = date(2024, 3, 2);
        let sunday = date(2024, 3, 3);
        assert!(validate_business_hours("09:00", saturday).is_ok());
        assert!(validate_business_hours("15:00", saturday).is_err());
        assert_eq!(
            message_of(&validate_business_hours("10:00", sunday).unwrap_err()),
            "Services are not available on Sundays"
        );
    }

    #[test]
    fn test_validate_business_hours_format() {
        assert!(validate_business_hours("9am", date(2024, 3, 4)).is_err());
    }

    #[test]
    fn test_validate_website() {
        assert!(validate_website("https://ezbiz.example").is_ok());
        assert!(validate_website("ezbiz.example").is_err());
    }
}
