//! Time Normalizer
//!
//! Corrects device-reported timestamps for clock drift and confines events to
//! a single user-local calendar day before they reach the merge engine.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::instrument;

use crate::config::AnalysisConfig;
use crate::logging::{log_clock_drift_corrected, log_day_boundary_split};
use crate::models::activity_events::NormalizedEvent;
use crate::services::time_provider::TimeProvider;
use crate::services::timezone_service::{TimezoneResult, TimezoneService};

/// Drift correction and day-boundary splitting for raw events
pub struct TimeNormalizer {
    time_provider: Arc<dyn TimeProvider>,
    timezone_service: TimezoneService,
    clock_skew_tolerance: Duration,
}

impl TimeNormalizer {
    pub fn new(
        time_provider: Arc<dyn TimeProvider>,
        timezone_service: TimezoneService,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            time_provider,
            timezone_service,
            clock_skew_tolerance: config.clock_skew_tolerance(),
        }
    }

    /// Server time
    pub fn now(&self) -> DateTime<Utc> {
        self.time_provider.now_utc()
    }

    /// How far the device clock runs ahead of the server clock
    ///
    /// Offsets within the skew tolerance count as zero.
    pub fn clock_offset(&self, device_date_time: DateTime<Utc>) -> Duration {
        let offset = device_date_time - self.now();
        if offset.abs() <= self.clock_skew_tolerance {
            Duration::zero()
        } else {
            log_clock_drift_corrected(offset.num_milliseconds());
            offset
        }
    }

    /// Shift a device-reported interval onto the server clock
    pub fn correct_drift(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        offset: Duration,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        (start_time - offset, end_time - offset)
    }

    /// Split an event at the user-local day boundary it crosses
    ///
    /// Returns one event when the interval stays within a day and two when it
    /// crosses midnight. Days strictly between the start day and the end day
    /// are not represented.
    #[instrument(skip(self, event), fields(start = %event.start_time, end = %event.end_time))]
    pub fn split_at_day_boundary(
        &self,
        time_zone: Tz,
        event: NormalizedEvent,
    ) -> TimezoneResult<Vec<NormalizedEvent>> {
        let start_date = self.timezone_service.local_date(event.start_time, time_zone);
        let end_of_start_day = self
            .timezone_service
            .start_of_next_day(time_zone, start_date)?;

        if event.end_time <= end_of_start_day {
            return Ok(vec![event]);
        }

        let end_date = self.timezone_service.local_date(event.end_time, time_zone);
        let start_of_end_day = self.timezone_service.start_of_day(time_zone, end_date)?;
        log_day_boundary_split(
            event.start_time,
            event.end_time,
            start_of_end_day > end_of_start_day,
        );

        let head = NormalizedEvent {
            end_time: end_of_start_day,
            ..event.clone()
        };

        let mut parts = vec![head];
        if event.end_time > start_of_end_day {
            parts.push(NormalizedEvent {
                start_time: start_of_end_day,
                ..event
            });
        }
        Ok(parts)
    }
}
