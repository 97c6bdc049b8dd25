//! On-time deadline and the local-date key of scan events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike};

use crate::config::DEFAULT_ON_TIME_DEADLINE;
use crate::error::{Error, Result};
use crate::model::Timeliness;

/// Daily check-in deadline at minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    hour: u32,
    minute: u32,
}

impl Deadline {
    /// Build a deadline from hour and minute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeadline`] if the hour or minute is out of
    /// range.
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidDeadline {
                value: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Parse an `HH:MM` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeadline`] if the value is not `HH:MM`.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidDeadline {
            value: value.to_string(),
        };

        let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;

        Self::new(hour, minute).map_err(|_| invalid())
    }

    /// Hour component.
    #[must_use]
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Minute component.
    #[must_use]
    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Classify a local time of day. Only hour and minute are compared, and
    /// a check-in is late only when strictly after the deadline.
    #[must_use]
    pub fn classify(&self, time: NaiveTime) -> Timeliness {
        if (time.hour(), time.minute()) > (self.hour, self.minute) {
            Timeliness::Late
        } else {
            Timeliness::OnTime
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::parse(DEFAULT_ON_TIME_DEADLINE).unwrap_or(Self {
            hour: 7,
            minute: 30,
        })
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for Deadline {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The calendar day of an event in its own (local) offset.
///
/// This is the date component of the attendance key; it must not be taken
/// from the UTC instant, which can fall on the previous day.
#[must_use]
pub fn local_date<Tz: TimeZone>(event: &DateTime<Tz>) -> NaiveDate {
    event.date_naive()
}

/// Timeliness of a check-in event against a deadline, using the event's
/// local time of day.
#[must_use]
pub fn compute_timeliness<Tz: TimeZone>(event: &DateTime<Tz>, deadline: Deadline) -> Timeliness {
    deadline.classify(event.time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn wib(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
    }

    #[test]
    fn test_parse_valid() {
        let d = Deadline::parse("07:30").unwrap();
        assert_eq!((d.hour(), d.minute()), (7, 30));
        assert_eq!(Deadline::parse("7:05").unwrap().to_string(), "07:05");
        assert_eq!("23:59".parse::<Deadline>().unwrap().to_string(), "23:59");
    }

    #[test]
    fn test_parse_invalid() {
        for value in ["", "0730", "7.30", "24:00", "07:60", "07:3", "aa:bb", "123:00"] {
            let err = Deadline::parse(value).unwrap_err();
            assert!(matches!(err, Error::InvalidDeadline { .. }), "{value}");
        }
    }

    #[test]
    fn test_default_deadline() {
        assert_eq!(Deadline::default().to_string(), "07:30");
    }

    #[test]
    fn test_classify_boundary() {
        let deadline = Deadline::new(7, 30).unwrap();
        let at = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();

        assert_eq!(deadline.classify(at(7, 29, 59)), Timeliness::OnTime);
        assert_eq!(deadline.classify(at(7, 30, 0)), Timeliness::OnTime);
        // Seconds are ignored
        assert_eq!(deadline.classify(at(7, 30, 59)), Timeliness::OnTime);
        assert_eq!(deadline.classify(at(7, 31, 0)), Timeliness::Late);
        assert_eq!(deadline.classify(at(8, 0, 0)), Timeliness::Late);
        assert_eq!(deadline.classify(at(6, 59, 0)), Timeliness::OnTime);
    }

    #[test]
    fn test_compute_timeliness_uses_local_time() {
        // 07:45 WIB is 00:45 UTC, which would be on time if read as UTC.
        let event = wib(2024, 8, 1, 7, 45, 0);
        assert_eq!(
            compute_timeliness(&event, Deadline::default()),
            Timeliness::Late
        );
    }

    #[test]
    fn test_local_date_not_utc_date() {
        // 06:30 WIB on Aug 2 is still Aug 1 in UTC.
        let event = wib(2024, 8, 2, 6, 30, 0);
        assert_eq!(event.naive_utc().date(), NaiveDate::from_ymd_opt(2024, 8, 1).unwrap());
        assert_eq!(local_date(&event), NaiveDate::from_ymd_opt(2024, 8, 2).unwrap());
    }
}
