//! User-local calendar arithmetic
//!
//! Day aggregates are keyed by the user's local date and weeks start on
//! Sunday, so every boundary decision goes through this service.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, thiserror::Error)]
pub enum TimezoneError {
    #[error("Unknown IANA time zone '{0}'")]
    UnknownZone(String),

    #[error("No local start of day for {date} in {timezone}")]
    NoStartOfDay { date: NaiveDate, timezone: String },
}

pub type TimezoneResult<T> = Result<T, TimezoneError>;

/// Day and week boundaries in a user's time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct TimezoneService;

impl TimezoneService {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a stored or configured zone name such as `Europe/Amsterdam`
    pub fn parse_timezone(&self, name: &str) -> TimezoneResult<Tz> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TimezoneError::UnknownZone(name.to_string()));
        }
        trimmed
            .parse::<Tz>()
            .map_err(|_| TimezoneError::UnknownZone(name.to_string()))
    }

    /// Calendar date of `instant` as seen in `timezone`
    pub fn local_date(&self, instant: DateTime<Utc>, timezone: Tz) -> NaiveDate {
        instant.with_timezone(&timezone).date_naive()
    }

    /// First instant of `date` in `timezone`
    ///
    /// Ambiguous midnights resolve to the earlier instant. Where a DST gap
    /// swallows midnight, the first existing quarter hour of the day is used.
    pub fn start_of_day(&self, timezone: Tz, date: NaiveDate) -> TimezoneResult<DateTime<Utc>> {
        let midnight = date.and_time(NaiveTime::MIN);
        match timezone.from_local_datetime(&midnight) {
            LocalResult::Single(start) => Ok(start.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => (1..=12)
                .map(|quarter| midnight + chrono::Duration::minutes(15 * quarter))
                .find_map(|candidate| timezone.from_local_datetime(&candidate).earliest())
                .map(|start| start.with_timezone(&Utc))
                .ok_or_else(|| TimezoneError::NoStartOfDay {
                    date,
                    timezone: timezone.name().to_string(),
                }),
        }
    }

    /// First instant of the day after `date`, i.e. the exclusive end of `date`
    pub fn start_of_next_day(
        &self,
        timezone: Tz,
        date: NaiveDate,
    ) -> TimezoneResult<DateTime<Utc>> {
        let next = date.succ_opt().ok_or_else(|| TimezoneError::NoStartOfDay {
            date,
            timezone: timezone.name().to_string(),
        })?;
        self.start_of_day(timezone, next)
    }

    /// Sunday on or before `date`
    pub fn week_start(&self, date: NaiveDate) -> NaiveDate {
        let offset = u64::from(date.weekday().num_days_from_sunday());
        date.checked_sub_days(Days::new(offset)).unwrap_or(date)
    }
}
