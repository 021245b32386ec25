//! Week Activity Model
//!
//! Groups the day activities of one user and goal for a week starting on Sunday.

use chrono::{Days, NaiveDate, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::day_activity::DayActivity;

/// Weekly aggregate: the day activities recorded for one (user, goal, week)
#[derive(Debug, Clone, PartialEq)]
pub struct WeekActivity {
    pub id: Uuid,

    pub user_anonymized_id: Uuid,

    pub goal_id: Uuid,

    /// Sunday the week starts on, in the user's timezone
    pub week_start: NaiveDate,

    pub time_zone: Tz,

    /// Day activity id per calendar date within the week
    days: BTreeMap<NaiveDate, Uuid>,
}

impl WeekActivity {
    pub fn new(
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        week_start: NaiveDate,
        time_zone: Tz,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_anonymized_id,
            goal_id,
            week_start,
            time_zone,
            days: BTreeMap::new(),
        }
    }

    /// Rebuild a stored aggregate
    pub fn from_parts(
        id: Uuid,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        week_start: NaiveDate,
        time_zone: Tz,
        days: BTreeMap<NaiveDate, Uuid>,
    ) -> Self {
        Self {
            id,
            user_anonymized_id,
            goal_id,
            week_start,
            time_zone,
            days,
        }
    }

    /// Exclusive end date of the week
    pub fn week_end(&self) -> NaiveDate {
        self.week_start
            .checked_add_days(Days::new(7))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.week_start && date < self.week_end()
    }

    pub fn days(&self) -> &BTreeMap<NaiveDate, Uuid> {
        &self.days
    }

    /// Day activity id recorded for `weekday`, if any
    pub fn day_id(&self, weekday: Weekday) -> Option<Uuid> {
        let date = self
            .week_start
            .checked_add_days(Days::new(u64::from(weekday.num_days_from_sunday())))?;
        self.days.get(&date).copied()
    }

    /// Attach a day activity; returns false when that date was already attached
    pub fn attach_day(&mut self, day: &DayActivity) -> AnalysisResult<bool> {
        if day.user_anonymized_id != self.user_anonymized_id || day.goal_id != self.goal_id {
            return Err(AnalysisError::invariant_violation(&format!(
                "day activity {} belongs to another user or goal than week {}",
                day.id, self.id
            )));
        }

        if !self.covers(day.date) {
            return Err(AnalysisError::invariant_violation(&format!(
                "day {} outside week starting {}",
                day.date, self.week_start
            )));
        }

        // a different id for the date means the earlier aggregate never made it to storage
        Ok(self.days.insert(day.date, day.id) != Some(day.id))
    }
}
