use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Calendar years a timestamp may carry.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Six signed calendar components.
///
/// Used as a relative offset, or, in set-date mode, as the literal
/// year/month/day/hour/minute/second of the target timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOffset {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("存在しない日時です: {0}")]
    InvalidDate(DateOffset),
    #[error("オフセット適用後の日時が範囲外です: {0}")]
    OutOfRange(NaiveDateTime),
}

impl DateOffset {
    /// Builds an offset from raw text fields; empty or invalid text becomes 0.
    pub fn from_text_fields(
        years: &str,
        months: &str,
        days: &str,
        hours: &str,
        minutes: &str,
        seconds: &str,
    ) -> Self {
        Self {
            years: parse_component(years),
            months: parse_component(months),
            days: parse_component(days),
            hours: parse_component(hours),
            minutes: parse_component(minutes),
            seconds: parse_component(seconds),
        }
    }

    pub fn from_datetime(value: NaiveDateTime) -> Self {
        Self {
            years: value.year(),
            months: value.month() as i32,
            days: value.day() as i32,
            hours: value.hour() as i32,
            minutes: value.minute() as i32,
            seconds: value.second() as i32,
        }
    }

    pub fn now_utc() -> Self {
        Self::from_datetime(Utc::now().naive_utc())
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Adds seconds, minutes, hours, days, months and years in that order.
    /// Month and year steps clamp the day to the end of the target month.
    pub fn apply_to(&self, current: NaiveDateTime) -> Result<NaiveDateTime, DateError> {
        current
            .checked_add_signed(TimeDelta::seconds(i64::from(self.seconds)))
            .and_then(|t| t.checked_add_signed(TimeDelta::minutes(i64::from(self.minutes))))
            .and_then(|t| t.checked_add_signed(TimeDelta::hours(i64::from(self.hours))))
            .and_then(|t| t.checked_add_signed(TimeDelta::days(i64::from(self.days))))
            .and_then(|t| add_months(t, i64::from(self.months)))
            .and_then(|t| add_months(t, i64::from(self.years) * 12))
            .filter(|t| YEAR_RANGE.contains(&t.year()))
            .ok_or(DateError::OutOfRange(current))
    }

    pub fn to_absolute(&self) -> Result<NaiveDateTime, DateError> {
        let invalid = || DateError::InvalidDate(*self);
        if !YEAR_RANGE.contains(&self.years) {
            return Err(invalid());
        }
        let month = u32::try_from(self.months).map_err(|_| invalid())?;
        let day = u32::try_from(self.days).map_err(|_| invalid())?;
        let hour = u32::try_from(self.hours).map_err(|_| invalid())?;
        let minute = u32::try_from(self.minutes).map_err(|_| invalid())?;
        let second = u32::try_from(self.seconds).map_err(|_| invalid())?;

        NaiveDate::from_ymd_opt(self.years, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(invalid)
    }
}

impl fmt::Display for DateOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{} {}:{}:{}",
            self.years, self.months, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

pub fn parse_component(text: &str) -> i32 {
    text.trim().parse().unwrap_or(0)
}

fn add_months(value: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        value.checked_add_months(magnitude)
    } else {
        value.checked_sub_months(magnitude)
    }
}
