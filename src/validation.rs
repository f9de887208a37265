//! Input checks shared by the core operations
//!
//! Every helper fails with `AppError::Validation` and runs before any row is
//! written.

use chrono::NaiveDate;
use validator::ValidateEmail;

use crate::error::{AppError, AppResult};

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// Scores and workload shares live in 0..=100
pub fn score(score: i32) -> AppResult<i32> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(AppError::Validation(format!(
            "score must be between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        )))
    }
}

pub fn workload_percent(percent: Option<i32>) -> AppResult<Option<i32>> {
    match percent {
        Some(p) if !(0..=100).contains(&p) => Err(AppError::Validation(format!(
            "workload_percent must be between 0 and 100, got {}",
            p
        ))),
        other => Ok(other),
    }
}

/// Trimmed text with a character count in `min..=max`
pub fn text(field: &str, value: &str, min: usize, max: usize) -> AppResult<String> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min {
        if min <= 1 {
            return Err(AppError::Validation(format!("{} is required", field)));
        }
        return Err(AppError::Validation(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "{} must not exceed {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Inclusive date range; either bound may be open
pub fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::Validation(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(())
}

pub fn period(year: i32, month: i32) -> AppResult<()> {
    if !(2000..=9999).contains(&year) {
        return Err(AppError::Validation(format!("invalid year {}", year)));
    }
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("invalid month {}", month)));
    }
    Ok(())
}

/// Email address per `validator`, lowercased on success
pub fn email(value: &str) -> AppResult<String> {
    let value = value.trim().to_lowercase();
    if value.len() > 120 || !value.validate_email() {
        return Err(AppError::Validation(format!("invalid email address: {}", value)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert_eq!(score(0).unwrap(), 0);
        assert_eq!(score(100).unwrap(), 100);
        assert!(score(-1).is_err());
        assert!(score(101).is_err());
    }

    #[test]
    fn test_text_trims_and_limits() {
        assert_eq!(text("name", "  Ops  ", 1, 10).unwrap(), "Ops");
        assert!(matches!(text("name", "   ", 1, 10), Err(AppError::Validation(_))));
        assert!(text("name", "a", 2, 10).is_err());
        assert!(text("name", "abcdef", 1, 5).is_err());
    }

    #[test]
    fn test_date_range() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        assert!(date_range(Some(d(1)), Some(d(31))).is_ok());
        assert!(date_range(Some(d(1)), Some(d(1))).is_ok());
        assert!(date_range(Some(d(2)), Some(d(1))).is_err());
        assert!(date_range(None, Some(d(1))).is_ok());
    }

    #[test]
    fn test_email() {
        assert_eq!(email(" Ann@Example.com ").unwrap(), "ann@example.com");
        assert!(email("ann").is_err());
        assert!(email("ann smith@example.com").is_err());
        assert!(email("a@b@c.com").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("ann@.com").is_err());
    }

    #[test]
    fn test_period() {
        assert!(period(2024, 3).is_ok());
        assert!(period(2024, 0).is_err());
        assert!(period(2024, 13).is_err());
        assert!(period(1999, 1).is_err());
    }
}
