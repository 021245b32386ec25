//! Week Activity Builder
//!
//! Attaches newly created day activities to their Sunday-based week
//! aggregate, creating the week on first use. Reads and writes go straight to
//! storage; weeks are not cached.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::database::ActivityStore;
use crate::error::AnalysisResult;
use crate::models::{DayActivity, WeekActivity};
use crate::services::timezone_service::TimezoneService;

pub struct WeekActivityBuilder {
    store: Arc<dyn ActivityStore>,
    timezone_service: TimezoneService,
}

impl WeekActivityBuilder {
    pub fn new(store: Arc<dyn ActivityStore>, timezone_service: TimezoneService) -> Self {
        Self {
            store,
            timezone_service,
        }
    }

    /// Attach `day` to the week containing it and persist the week if it changed
    #[instrument(skip(self, day), fields(day_activity_id = %day.id, date = %day.date))]
    pub async fn attach_day(&self, day: &DayActivity) -> AnalysisResult<WeekActivity> {
        let week_start = self.timezone_service.week_start(day.date);

        let existing = self
            .store
            .find_week_activity(day.user_anonymized_id, day.goal_id, week_start)
            .await?;
        let created = existing.is_none();
        let mut week = existing.unwrap_or_else(|| {
            WeekActivity::new(day.user_anonymized_id, day.goal_id, week_start, day.time_zone)
        });

        let attached = week.attach_day(day)?;
        if created || attached {
            self.store.save_week_activity(&week).await?;
            debug!(week_start = %week_start, created, "Week activity updated");
        }

        Ok(week)
    }
}
