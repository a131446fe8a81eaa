//! Schedule expressions - cron parsing and next-fire computation.
//!
//! Accepts the classic five-field format
//! `minute hour day_of_month month day_of_week`, the six-field format with a
//! leading seconds field, and the `@`-nicknames listed in [`NICKNAMES`].
//!
//! Fire times are computed in the schedule's timezone (an IANA name such as
//! `Europe/Paris`) or, when none is given, in the host's local timezone.
//!
//! When both day-of-month and day-of-week are restricted, a time matching
//! either field fires, as in classic cron: `0 0 1 * 1` runs on every Monday
//! and on the 1st of each month.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Nicknames and the five-field expressions they stand for.
pub const NICKNAMES: &[(&str, &str)] = &[
    ("@yearly", "0 0 1 1 *"),
    ("@annually", "0 0 1 1 *"),
    ("@monthly", "0 0 1 * *"),
    ("@weekly", "0 0 * * 0"),
    ("@daily", "0 0 * * *"),
    ("@hourly", "0 * * * *"),
];

/// Errors raised while parsing a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The cron expression could not be parsed.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// The timezone is not a known IANA name.
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

impl ScheduleError {
    fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Timezone in which fire times are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleZone {
    /// Host local timezone.
    Local,
    /// Named IANA timezone.
    Named(Tz),
}

impl fmt::Display for ScheduleZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleZone::Local => write!(f, "local"),
            ScheduleZone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// A parsed, validated schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    zone: ScheduleZone,
    /// One schedule, or two whose fire times are merged when both day fields
    /// are restricted.
    inner: Vec<cron::Schedule>,
}

impl Schedule {
    /// Parse an expression with an optional IANA timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when the expression or timezone is invalid.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, ScheduleError> {
        let zone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(name) => ScheduleZone::Named(
                Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))?,
            ),
            None => ScheduleZone::Local,
        };

        let inner = normalize(expression)?
            .iter()
            .map(|normalized| {
                cron::Schedule::from_str(normalized)
                    .map_err(|e| ScheduleError::invalid(expression, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            expression: expression.trim().to_string(),
            zone,
            inner,
        })
    }

    /// The expression as given by the user.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The timezone fire times are computed in.
    pub fn zone(&self) -> ScheduleZone {
        self.zone
    }

    /// First fire time strictly after `from`.
    pub fn next_run(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.upcoming(from, 1).into_iter().next()
    }

    /// The next `count` fire times strictly after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        match self.zone {
            ScheduleZone::Local => self.fires_after(from.with_timezone(&Local), count),
            ScheduleZone::Named(tz) => self.fires_after(from.with_timezone(&tz), count),
        }
    }

    fn fires_after<Z: TimeZone>(&self, from: DateTime<Z>, count: usize) -> Vec<DateTime<Utc>> {
        let mut fires: Vec<DateTime<Utc>> = self
            .inner
            .iter()
            .flat_map(|schedule| {
                schedule
                    .after(&from)
                    .take(count)
                    .map(|fire| fire.with_timezone(&Utc))
            })
            .collect();
        fires.sort();
        fires.dedup();
        fires.truncate(count);
        fires
    }
}

/// Check an expression without keeping the parsed schedule.
pub fn validate(expression: &str, timezone: Option<&str>) -> Result<(), ScheduleError> {
    Schedule::parse(expression, timezone).map(|_| ())
}

/// Rewrite user input into the seconds-first format understood by `cron`.
///
/// Yields two expressions when both day fields are restricted: one per day
/// field, the other day field opened to `*`.
fn normalize(expression: &str) -> Result<Vec<String>, ScheduleError> {
    let trimmed = expression.trim();

    let expanded = if trimmed.starts_with('@') {
        NICKNAMES
            .iter()
            .find(|(nickname, _)| nickname.eq_ignore_ascii_case(trimmed))
            .map(|(_, fields)| *fields)
            .ok_or_else(|| ScheduleError::invalid(expression, "unknown nickname"))?
    } else {
        trimmed
    };

    let fields: Vec<&str> = expanded.split_whitespace().collect();
    let (seconds, rest) = match fields.len() {
        5 => ("0", &fields[..]),
        6 => (fields[0], &fields[1..]),
        n => {
            return Err(ScheduleError::invalid(
                expression,
                format!("expected 5 or 6 fields, found {}", n),
            ));
        }
    };

    let weekday =
        weekday_field(rest[4]).map_err(|reason| ScheduleError::invalid(expression, reason))?;
    let day_of_month = rest[2];
    let line = |day_of_month: &str, weekday: &str| {
        format!(
            "{} {} {} {} {} {}",
            seconds, rest[0], rest[1], day_of_month, rest[3], weekday
        )
    };

    if is_restricted(day_of_month) && is_restricted(rest[4]) {
        Ok(vec![line(day_of_month, "*"), line("*", &weekday)])
    } else {
        Ok(vec![line(day_of_month, &weekday)])
    }
}

fn is_restricted(field: &str) -> bool {
    field != "*" && field != "?"
}

/// Translate a day-of-week field from cron numbering (0-7, Sunday is 0 and 7)
/// to the `cron` crate's numbering (1-7, Sunday is 1).
///
/// Day names (`SUN`..`SAT`) may be mixed with numbers in lists and ranges.
fn weekday_field(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: usize = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step '{}'", step))?;
                (range, step)
            }
            None => (part, 1),
        };
        if step == 0 {
            return Err("day-of-week step must be positive".to_string());
        }

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((start, end)) = range.split_once('-') {
            let start = weekday_number(start)?;
            match weekday_number(end)? {
                // FRI-SUN
                0 if start > 0 => (start, 7),
                end => (start, end),
            }
        } else {
            let day = weekday_number(range)?;
            if part.contains('/') { (day, 7) } else { (day, day) }
        };
        if start > end {
            return Err(format!("invalid day-of-week range '{}'", range));
        }

        for day in (start..=end).step_by(step) {
            days[(day % 7) as usize] = true;
        }
    }

    Ok(days
        .iter()
        .enumerate()
        .filter(|(_, selected)| **selected)
        .map(|(day, _)| (day + 1).to_string())
        .collect::<Vec<_>>()
        .join(","))
}

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn weekday_number(value: &str) -> Result<u32, String> {
    if let Some(day) = WEEKDAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
    {
        return Ok(day as u32);
    }
    match value.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        _ => Err(format!(
            "day-of-week value '{}' must be 0-7 or SUN-SAT",
            value
        )),
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
