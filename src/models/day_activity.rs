//! Day Activity Model
//!
//! One user's usage for one goal on one calendar day in the user's timezone.
//! Holds the recorded activities in start-time order and derives the daily
//! totals and the quarter-hour spread from them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::activity::Activity;
use crate::models::goal::{Goal, GoalKind};
use crate::services::timezone_service::{TimezoneResult, TimezoneService};

/// Number of 15-minute buckets in the spread of a day
pub const SPREAD_BUCKETS: usize = 96;

const BUCKET_MINUTES: i64 = 15;

/// Daily activity aggregate for one (user, goal, day)
#[derive(Debug, Clone, PartialEq)]
pub struct DayActivity {
    /// Unique identifier for the aggregate
    pub id: Uuid,

    pub user_anonymized_id: Uuid,

    pub goal_id: Uuid,

    /// Calendar date in the user's timezone
    pub date: NaiveDate,

    /// User's timezone when the aggregate was created
    pub time_zone: Tz,

    /// First instant of the day
    start_time: DateTime<Utc>,

    /// First instant of the following day
    end_time: DateTime<Utc>,

    /// Activities ordered by start time
    activities: Vec<Activity>,
}

impl DayActivity {
    /// Create an empty aggregate for `date` in `time_zone`
    pub fn create(
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        time_zone: Tz,
        date: NaiveDate,
        timezone_service: &TimezoneService,
    ) -> TimezoneResult<Self> {
        let start_time = timezone_service.start_of_day(time_zone, date)?;
        let end_time = timezone_service.start_of_next_day(time_zone, date)?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_anonymized_id,
            goal_id,
            date,
            time_zone,
            start_time,
            end_time,
            activities: Vec::new(),
        })
    }

    /// Rebuild a stored aggregate
    pub fn from_parts(
        id: Uuid,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
        date: NaiveDate,
        time_zone: Tz,
        timezone_service: &TimezoneService,
        mut activities: Vec<Activity>,
    ) -> TimezoneResult<Self> {
        activities.sort_by_key(|activity| activity.start_time);
        let mut day = Self::create(user_anonymized_id, goal_id, time_zone, date, timezone_service)?;
        day.id = id;
        day.activities = activities;
        Ok(day)
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Exclusive end of the day
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Whether `instant` falls in `[start_time, end_time)`
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_time && instant < self.end_time
    }

    /// Whether `[start, end]` lies within this day
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= end && start >= self.start_time && end <= self.end_time
    }

    /// The most recently started activity reported by `device_id`
    pub fn last_activity(&self, device_id: Option<Uuid>) -> Option<&Activity> {
        self.activities
            .iter()
            .rev()
            .find(|activity| activity.device_id == device_id)
    }

    /// Insert an activity keeping start-time order
    pub fn add_activity(&mut self, activity: Activity) -> AnalysisResult<()> {
        if !self.contains(activity.start_time, activity.end_time) {
            return Err(AnalysisError::invariant_violation(&format!(
                "activity {}..{} outside day {} of aggregate {}",
                activity.start_time, activity.end_time, self.date, self.id
            )));
        }

        let position = self
            .activities
            .partition_point(|existing| existing.start_time <= activity.start_time);
        self.activities.insert(position, activity);
        Ok(())
    }

    /// Move the end of an existing activity forward, returning the updated copy
    pub fn extend_activity(
        &mut self,
        activity_id: Uuid,
        end_time: DateTime<Utc>,
    ) -> AnalysisResult<Activity> {
        let day_end = self.end_time;
        let date = self.date;
        let activity = self
            .activities
            .iter_mut()
            .find(|activity| activity.id == activity_id)
            .ok_or_else(|| {
                AnalysisError::invariant_violation(&format!(
                    "activity {activity_id} missing from day {date}"
                ))
            })?;

        if end_time > day_end {
            return Err(AnalysisError::invariant_violation(&format!(
                "extension to {end_time} crosses the end of day {date}"
            )));
        }

        activity.extend_to(end_time);
        Ok(activity.clone())
    }

    /// Minutes active per 15-minute slot of the day
    ///
    /// Overlap with each slot is rounded to the nearest minute. On days longer
    /// than 24 hours the final slot also receives the overflow.
    pub fn spread(&self) -> Vec<u32> {
        let mut seconds = [0i64; SPREAD_BUCKETS];

        for (bucket, total) in seconds.iter_mut().enumerate() {
            let bucket_start = self.start_time + Duration::minutes(BUCKET_MINUTES * bucket as i64);
            let bucket_end = if bucket + 1 == SPREAD_BUCKETS {
                self.end_time
            } else {
                (bucket_start + Duration::minutes(BUCKET_MINUTES)).min(self.end_time)
            };
            if bucket_start >= bucket_end {
                continue;
            }

            *total = self
                .activities
                .iter()
                .map(|activity| {
                    let overlap_start = activity.start_time.max(bucket_start);
                    let overlap_end = activity.end_time.min(bucket_end);
                    (overlap_end - overlap_start).num_seconds().max(0)
                })
                .sum();
        }

        seconds
            .iter()
            .map(|secs| u32::try_from((secs + 30) / 60).unwrap_or(u32::MAX))
            .collect()
    }

    /// Sum of the whole-minute durations of all activities
    pub fn total_activity_duration_minutes(&self) -> u32 {
        self.activities.iter().map(Activity::duration_minutes).sum()
    }

    /// Whether the day stayed within the goal
    pub fn is_goal_accomplished(&self, goal: &Goal) -> bool {
        match goal.kind {
            GoalKind::NoGo => self.activities.is_empty(),
            GoalKind::Budget { max_duration_minutes } => {
                self.total_activity_duration_minutes() <= max_duration_minutes
            }
        }
    }

    /// Minutes of usage over the goal's allowance
    pub fn total_minutes_beyond_goal(&self, goal: &Goal) -> u32 {
        let total = self.total_activity_duration_minutes();
        match goal.kind {
            GoalKind::NoGo => total,
            GoalKind::Budget { max_duration_minutes } => total.saturating_sub(max_duration_minutes),
        }
    }
}
