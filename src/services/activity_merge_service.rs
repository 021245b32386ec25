//! Activity Merge Service
//!
//! Decides, for one normalized event and one goal, whether the event extends
//! the last recorded activity, becomes a new activity in an existing day, or
//! opens a new day activity. All steps for a (user, goal) run while holding
//! that key's cache guard.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::borrow::Cow;
use std::sync::Arc;
use strum::IntoStaticStr;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::database::ActivityStore;
use crate::error::{AnalysisError, AnalysisResult};
use crate::logging::{log_activity_merged, log_cache_lookup};
use crate::models::{Activity, DayActivity, Goal, NormalizedEvent, UserAnonymized};
use crate::services::day_activity_cache::{CacheSlot, DayActivityCache};
use crate::services::timezone_service::TimezoneService;
use crate::services::week_activity_builder::WeekActivityBuilder;

/// How the cached day activity relates to the day of an event
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CacheLookup {
    /// Nothing recorded yet for the key
    Empty,
    /// The event falls inside the cached day
    Current(DayActivity),
    /// The event is after the end of the cached day
    Following,
    /// The event is before the cached day; holds what storage has for its day
    Preceding(Option<DayActivity>),
}

/// What a merge did to the day activity
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MergeOutcome {
    /// A new activity was recorded
    Created { activity: Activity, day_created: bool },
    /// The last activity's end time moved forward and was persisted
    Extended { activity: Activity },
    /// The event fell inside the skip window; nothing changed
    Absorbed { activity: Activity },
}

impl MergeOutcome {
    /// The activity created, extended or absorbed into
    pub fn activity(&self) -> &Activity {
        match self {
            MergeOutcome::Created { activity, .. }
            | MergeOutcome::Extended { activity }
            | MergeOutcome::Absorbed { activity } => activity,
        }
    }

    /// Whether storage was written
    pub fn is_persisted(&self) -> bool {
        !matches!(self, MergeOutcome::Absorbed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Result of merging one event under one goal
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub outcome: MergeOutcome,
    /// The day activity after the merge
    pub day_activity: DayActivity,
}

/// A lookup together with the day an aggregate for the event belongs to
struct Classified {
    lookup: CacheLookup,
    time_zone: Tz,
    date: NaiveDate,
}

enum MergeDecision {
    Create,
    Extend(Uuid),
    Absorb(Activity),
}

/// The merge engine
pub struct ActivityMergeService {
    store: Arc<dyn ActivityStore>,
    cache: Arc<DayActivityCache>,
    week_builder: WeekActivityBuilder,
    timezone_service: TimezoneService,
    config: AnalysisConfig,
}

impl ActivityMergeService {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        cache: Arc<DayActivityCache>,
        timezone_service: TimezoneService,
        config: AnalysisConfig,
    ) -> Self {
        let week_builder = WeekActivityBuilder::new(Arc::clone(&store), timezone_service);
        Self {
            store,
            cache,
            week_builder,
            timezone_service,
            config,
        }
    }

    /// Merge a day-bounded event into the (user, goal) aggregates
    ///
    /// The day is persisted and cached before its week is touched. A failed
    /// week update leaves the cached day marked so the next merge retries it.
    #[instrument(
        skip(self, user, goal, event),
        fields(user_anonymized_id = %user.id, goal_id = %goal.id, start = %event.start_time)
    )]
    pub async fn merge(
        &self,
        user: &UserAnonymized,
        goal: &Goal,
        event: &NormalizedEvent,
    ) -> AnalysisResult<MergeResult> {
        let mut slot = self.cache.lock(user.id, goal.id).await;

        if !slot.is_loaded() {
            let last = self.store.find_last_day_activity(user.id, goal.id).await?;
            slot.load(last);
        }

        let Classified {
            lookup,
            time_zone,
            date,
        } = self.classify(&slot, user, goal.id, event.start_time).await?;
        log_cache_lookup(user.id, goal.id, (&lookup).into(), date);

        let cached = !matches!(lookup, CacheLookup::Preceding(_));
        let attach_week = match &lookup {
            CacheLookup::Current(_) => slot.is_week_pending(),
            _ => true,
        };
        let (mut day, day_created) = match lookup {
            CacheLookup::Current(day) | CacheLookup::Preceding(Some(day)) => (day, false),
            CacheLookup::Empty | CacheLookup::Following | CacheLookup::Preceding(None) => {
                let day =
                    DayActivity::create(user.id, goal.id, time_zone, date, &self.timezone_service)?;
                (day, true)
            }
        };

        let event = fit_to_day(&day, event);
        let outcome = match self.decide(&day, &event) {
            MergeDecision::Create => {
                let activity = self.new_activity(&day, &event);
                day.add_activity(activity.clone())?;
                MergeOutcome::Created {
                    activity,
                    day_created,
                }
            }
            MergeDecision::Extend(activity_id) => {
                let activity = day.extend_activity(activity_id, event.end_time)?;
                MergeOutcome::Extended { activity }
            }
            MergeDecision::Absorb(activity) => MergeOutcome::Absorbed { activity },
        };

        if outcome.is_persisted() {
            self.store.save_day_activity(&day).await?;
        }

        if cached {
            slot.replace(day.clone());
        }

        if attach_week {
            self.week_builder.attach_day(&day).await?;
            if cached {
                slot.mark_week_attached();
            }
        }

        let activity = outcome.activity();
        log_activity_merged(
            user.id,
            goal.id,
            outcome.as_str(),
            activity.start_time,
            activity.end_time,
        );

        Ok(MergeResult {
            outcome,
            day_activity: day,
        })
    }

    /// Place `instant` relative to the cached day, using that day's own bounds
    ///
    /// A day keeps the zone it was created in. After a zone change the new
    /// zone applies from the first day that does not reuse an existing date.
    async fn classify(
        &self,
        slot: &CacheSlot,
        user: &UserAnonymized,
        goal_id: Uuid,
        instant: DateTime<Utc>,
    ) -> AnalysisResult<Classified> {
        let user_date = self.timezone_service.local_date(instant, user.time_zone);

        let Some(cached) = slot.day() else {
            return Ok(Classified {
                lookup: CacheLookup::Empty,
                time_zone: user.time_zone,
                date: user_date,
            });
        };

        if cached.covers(instant) {
            return Ok(Classified {
                time_zone: cached.time_zone,
                date: cached.date,
                lookup: CacheLookup::Current(cached.clone()),
            });
        }

        if instant >= cached.end_time() {
            let (time_zone, date) = if user_date > cached.date {
                (user.time_zone, user_date)
            } else {
                let date = self.timezone_service.local_date(instant, cached.time_zone);
                (cached.time_zone, date)
            };
            return Ok(Classified {
                lookup: CacheLookup::Following,
                time_zone,
                date,
            });
        }

        self.find_preceding(user, cached.time_zone, goal_id, instant).await
    }

    /// Stored day covering `instant`, or where a new one has to go
    ///
    /// The event's date is looked up in the user's zone, then in the cached
    /// day's zone and in the zone of any stored day that did not cover it.
    async fn find_preceding(
        &self,
        user: &UserAnonymized,
        cached_zone: Tz,
        goal_id: Uuid,
        instant: DateTime<Utc>,
    ) -> AnalysisResult<Classified> {
        let mut zones = vec![user.time_zone];
        if cached_zone != user.time_zone {
            zones.push(cached_zone);
        }
        let mut missing = None;

        let mut next = 0;
        while let Some(&time_zone) = zones.get(next) {
            next += 1;
            let date = self.timezone_service.local_date(instant, time_zone);

            match self.store.find_day_activity(user.id, goal_id, date).await? {
                Some(day) if day.covers(instant) => {
                    return Ok(Classified {
                        time_zone: day.time_zone,
                        date: day.date,
                        lookup: CacheLookup::Preceding(Some(day)),
                    });
                }
                Some(day) => {
                    if !zones.contains(&day.time_zone) {
                        zones.push(day.time_zone);
                    }
                }
                None if missing.is_none() => missing = Some((time_zone, date)),
                None => {}
            }
        }

        let Some((time_zone, date)) = missing else {
            warn!(%instant, "Every candidate date holds a day that does not cover the event");
            return Err(AnalysisError::InvariantViolation(format!(
                "no day aggregate can take an event at {instant}"
            )));
        };
        Ok(Classified {
            lookup: CacheLookup::Preceding(None),
            time_zone,
            date,
        })
    }

    fn decide(&self, day: &DayActivity, event: &NormalizedEvent) -> MergeDecision {
        let Some(last) = day.last_activity(event.device_id) else {
            return MergeDecision::Create;
        };

        // out-of-order input never combines
        if event.start_time < last.start_time {
            return MergeDecision::Create;
        }

        if event.start_time - last.end_time > self.config.combine_interval() {
            return MergeDecision::Create;
        }

        let growth = event.end_time - last.end_time;
        if event.end_time > last.end_time && growth >= self.config.skip_window() {
            MergeDecision::Extend(last.id)
        } else {
            MergeDecision::Absorb(last.clone())
        }
    }

    /// Activity for `event`, stretched to the minimum duration within the day
    fn new_activity(&self, day: &DayActivity, event: &NormalizedEvent) -> Activity {
        let minimum = self.config.minimum_activity_duration();
        let (mut start, mut end) = (event.start_time, event.end_time);

        if end - start < minimum {
            end = start + minimum;
            if end > day.end_time() {
                end = day.end_time();
                start = (end - minimum).max(day.start_time());
            }
        }

        Activity::new(start, end, event.device_id, event.app.clone())
    }
}

/// `event` cut at the end of `day`
///
/// Events are split at the user's current midnight; a day kept from an
/// earlier zone can end before that.
fn fit_to_day<'a>(day: &DayActivity, event: &'a NormalizedEvent) -> Cow<'a, NormalizedEvent> {
    if event.end_time <= day.end_time() {
        return Cow::Borrowed(event);
    }

    warn!(
        date = %day.date,
        time_zone = %day.time_zone,
        end_time = %event.end_time,
        "Event runs past a day kept from another time zone; cutting at its end"
    );
    let mut fitted = event.clone();
    fitted.end_time = day.end_time();
    Cow::Owned(fitted)
}
