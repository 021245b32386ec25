//! Activity Analysis Service
//!
//! Entry point of the engine. Normalizes incoming network and app events,
//! fans them out to the matching goals, merges them into the day and week
//! aggregates and raises conflict notifications for no-go goals.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, Instrument, Span};
use uuid::Uuid;

use crate::analysis_span;
use crate::config::AnalysisConfig;
use crate::database::ActivityStore;
use crate::error::{AnalysisError, AnalysisResult};
use crate::models::activity_events::truncate_url;
use crate::models::{
    AppActivityBatch, Goal, NetworkActivityEvent, NormalizedEvent, UserAnonymized,
};
use crate::services::activity_merge_service::{ActivityMergeService, MergeOutcome};
use crate::services::conflict_notifier::{ConflictNotifier, MessageDispatcher};
use crate::services::day_activity_cache::DayActivityCache;
use crate::services::goal_matcher::{GoalLookup, GoalMatcher};
use crate::services::time_normalizer::TimeNormalizer;
use crate::services::time_provider::TimeProvider;
use crate::services::timezone_service::TimezoneService;

/// Result of merging one day-bounded event under one goal
#[derive(Debug, Clone, PartialEq)]
pub struct GoalOutcome {
    pub goal_id: Uuid,
    /// Day activity the event was merged into
    pub day_activity_id: Uuid,
    pub date: NaiveDate,
    pub outcome: MergeOutcome,
    pub conflict_dispatched: bool,
}

/// Everything one analysis request changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub outcomes: Vec<GoalOutcome>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, MergeOutcome::Created { .. }))
            .count()
    }

    pub fn extended_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, MergeOutcome::Extended { .. }))
            .count()
    }

    pub fn absorbed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, MergeOutcome::Absorbed { .. }))
            .count()
    }

    pub fn conflicts_dispatched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.conflict_dispatched).count()
    }

    /// Latest calendar day that received activity
    ///
    /// Hosts pass it to [`UserAnonymized::record_monitored_activity`].
    pub fn latest_activity_date(&self) -> Option<NaiveDate> {
        self.outcomes.iter().map(|o| o.date).max()
    }

    fn summary(&self) -> String {
        format!(
            "created={} extended={} absorbed={}",
            self.created_count(),
            self.extended_count(),
            self.absorbed_count()
        )
    }
}

/// Activity analysis service
pub struct ActivityAnalysisService {
    config: AnalysisConfig,
    normalizer: TimeNormalizer,
    goal_matcher: GoalMatcher,
    merge_service: ActivityMergeService,
    notifier: ConflictNotifier,
    cache: Arc<DayActivityCache>,
}

impl ActivityAnalysisService {
    /// Create the service; fails when `config` does not validate
    pub fn new(
        config: AnalysisConfig,
        store: Arc<dyn ActivityStore>,
        goal_lookup: Arc<dyn GoalLookup>,
        dispatcher: Arc<dyn MessageDispatcher>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> AnalysisResult<Self> {
        config.validate()?;

        let timezone_service = TimezoneService::new();
        let cache = Arc::new(DayActivityCache::new());

        Ok(Self {
            normalizer: TimeNormalizer::new(
                Arc::clone(&time_provider),
                timezone_service,
                &config,
            ),
            goal_matcher: GoalMatcher::new(goal_lookup),
            merge_service: ActivityMergeService::new(
                store,
                Arc::clone(&cache),
                timezone_service,
                config.clone(),
            ),
            notifier: ConflictNotifier::new(dispatcher, time_provider, config.conflict_policy),
            cache,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The shared day activity cache
    pub fn cache(&self) -> &DayActivityCache {
        &self.cache
    }

    /// Forget cached state of a user, e.g. after their goals changed
    ///
    /// Waits for merges in progress for the user to finish.
    pub async fn invalidate_user(&self, user_anonymized_id: Uuid) -> usize {
        self.cache.invalidate_user(user_anonymized_id).await
    }

    /// Analyze a categorized network hit
    ///
    /// The hit is recorded at its event time, or at server time when absent.
    pub async fn analyze_network_activity(
        &self,
        user: &UserAnonymized,
        event: &NetworkActivityEvent,
    ) -> AnalysisResult<AnalysisReport> {
        let span = analysis_span!("network_activity", user.id);
        self.network_activity(user, event, &span)
            .instrument(span.clone())
            .await
    }

    /// Analyze a batch of offline app activity
    ///
    /// Device timestamps are corrected for clock drift against the batch's
    /// device time; activities are processed in corrected start order.
    pub async fn analyze_app_activity(
        &self,
        user: &UserAnonymized,
        batch: &AppActivityBatch,
    ) -> AnalysisResult<AnalysisReport> {
        let span = analysis_span!("app_activity", user.id);
        self.app_activity(user, batch, &span)
            .instrument(span.clone())
            .await
    }

    async fn network_activity(
        &self,
        user: &UserAnonymized,
        event: &NetworkActivityEvent,
        span: &Span,
    ) -> AnalysisResult<AnalysisReport> {
        let mut report = AnalysisReport::default();
        if event.categories.is_empty() {
            return Ok(report);
        }

        let observed_at = event.event_time.unwrap_or_else(|| self.normalizer.now());
        let goals = self
            .goal_matcher
            .matching_goals(user, event.categories.iter().map(String::as_str), observed_at)
            .await?;
        span.record("goals_matched", goals.len());
        if goals.is_empty() {
            return Ok(report);
        }

        let normalized = NormalizedEvent {
            start_time: observed_at,
            end_time: observed_at,
            device_id: event.device_id,
            app: None,
            url: Some(truncate_url(&event.url, self.config.max_url_length)),
        };
        self.process(user, &goals, normalized, &mut report).await?;

        span.record("outcomes", report.outcomes.len());
        info!(summary = %report.summary(), "Network activity analyzed");
        Ok(report)
    }

    async fn app_activity(
        &self,
        user: &UserAnonymized,
        batch: &AppActivityBatch,
        span: &Span,
    ) -> AnalysisResult<AnalysisReport> {
        if let Some(invalid) = batch.activities.iter().find(|a| a.end_time < a.start_time) {
            return Err(AnalysisError::invalid_input(&format!(
                "app activity for {} ends ({}) before it starts ({})",
                invalid.application, invalid.end_time, invalid.start_time
            )));
        }

        let offset = self.normalizer.clock_offset(batch.device_date_time);
        let mut corrected: Vec<(DateTime<Utc>, DateTime<Utc>, &str)> = batch
            .activities
            .iter()
            .map(|activity| {
                let (start, end) = self
                    .normalizer
                    .correct_drift(activity.start_time, activity.end_time, offset);
                (start, end, activity.application.as_str())
            })
            .collect();
        // stable, so equal starts keep the order the device reported them in
        corrected.sort_by_key(|(start, _, _)| *start);

        let mut report = AnalysisReport::default();
        let mut goals_matched = 0;
        for (start_time, end_time, application) in corrected {
            let goals = self
                .goal_matcher
                .matching_goals(user, [application], end_time)
                .await?;
            if goals.is_empty() {
                continue;
            }
            goals_matched += goals.len();

            let normalized = NormalizedEvent {
                start_time,
                end_time,
                device_id: batch.device_id,
                app: Some(application.to_string()),
                url: None,
            };
            self.process(user, &goals, normalized, &mut report).await?;
        }

        span.record("goals_matched", goals_matched);
        span.record("outcomes", report.outcomes.len());
        info!(summary = %report.summary(), "App activity analyzed");
        Ok(report)
    }

    /// Split, merge and notify one event for every goal in `goals`
    async fn process(
        &self,
        user: &UserAnonymized,
        goals: &[Goal],
        event: NormalizedEvent,
        report: &mut AnalysisReport,
    ) -> AnalysisResult<()> {
        let parts = self.normalizer.split_at_day_boundary(user.time_zone, event)?;

        for part in &parts {
            for goal in goals {
                let merged = self.merge_service.merge(user, goal, part).await?;

                let conflict_dispatched = if self.notifier.should_notify(goal, &merged.outcome) {
                    self.notifier
                        .notify(user, goal, merged.outcome.activity(), part.url.clone())
                        .await?;
                    true
                } else {
                    false
                };

                report.outcomes.push(GoalOutcome {
                    goal_id: goal.id,
                    day_activity_id: merged.day_activity.id,
                    date: merged.day_activity.date,
                    outcome: merged.outcome,
                    conflict_dispatched,
                });
            }
        }

        Ok(())
    }
}
