//! Conflict Notifier
//!
//! Builds goal conflict notifications for no-go violations and hands them to
//! the messaging collaborator: one to the user, a redacted copy to every
//! accepted buddy. Delivery and retries belong to the collaborator.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::ConflictNotificationPolicy;
use crate::error::{AnalysisError, AnalysisResult};
use crate::logging::log_conflict_dispatched;
use crate::models::{Activity, ConflictNotification, Goal, UserAnonymized};
use crate::services::activity_merge_service::MergeOutcome;
use crate::services::time_provider::TimeProvider;

/// Message hand-off provided by the surrounding service
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Deliver a notification to one anonymous destination
    async fn send_to_user(
        &self,
        destination: Uuid,
        notification: &ConflictNotification,
    ) -> anyhow::Result<()>;

    /// Deliver the same notification to every destination in `destinations`
    async fn broadcast_to_buddies(
        &self,
        destinations: &[Uuid],
        notification: &ConflictNotification,
    ) -> anyhow::Result<()>;
}

pub struct ConflictNotifier {
    dispatcher: Arc<dyn MessageDispatcher>,
    time_provider: Arc<dyn TimeProvider>,
    policy: ConflictNotificationPolicy,
}

impl ConflictNotifier {
    pub fn new(
        dispatcher: Arc<dyn MessageDispatcher>,
        time_provider: Arc<dyn TimeProvider>,
        policy: ConflictNotificationPolicy,
    ) -> Self {
        Self {
            dispatcher,
            time_provider,
            policy,
        }
    }

    /// Whether `outcome` under `goal` warrants a conflict notification
    pub fn should_notify(&self, goal: &Goal, outcome: &MergeOutcome) -> bool {
        if !goal.is_no_go() {
            return false;
        }

        match (self.policy, outcome) {
            (_, MergeOutcome::Created { .. }) => true,
            (ConflictNotificationPolicy::OnEveryChange, MergeOutcome::Extended { .. }) => true,
            _ => false,
        }
    }

    /// Send the conflict for `activity` to the user and their accepted buddies
    ///
    /// `url` is only ever included in the user's own copy.
    #[instrument(
        skip(self, user, goal, activity, url),
        fields(user_anonymized_id = %user.id, goal_id = %goal.id)
    )]
    pub async fn notify(
        &self,
        user: &UserAnonymized,
        goal: &Goal,
        activity: &Activity,
        url: Option<String>,
    ) -> AnalysisResult<ConflictNotification> {
        let notification = ConflictNotification::new(
            user.id,
            goal.id,
            goal.activity_category_id,
            activity.clone(),
            url,
            self.time_provider.now_utc(),
        );

        self.dispatcher
            .send_to_user(user.anonymous_destination_id, &notification)
            .await
            .map_err(|e| AnalysisError::messaging(&e))?;

        let buddies: Vec<Uuid> = user
            .accepted_buddies()
            .map(|buddy| buddy.anonymous_destination_id)
            .collect();
        if !buddies.is_empty() {
            self.dispatcher
                .broadcast_to_buddies(&buddies, &notification.redacted())
                .await
                .map_err(|e| AnalysisError::messaging(&e))?;
        }

        log_conflict_dispatched(user.id, goal.id, buddies.len());
        Ok(notification)
    }
}
