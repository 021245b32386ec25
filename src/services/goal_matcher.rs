//! Goal Matcher
//!
//! Resolves event labels to activity categories and then to the user's goals
//! that reference those categories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::goal::Goal;
use crate::models::user_anonymized::UserAnonymized;

/// Goal and category lookups provided by the surrounding service
#[async_trait]
pub trait GoalLookup: Send + Sync {
    /// Goals currently configured for the user
    async fn active_goals_for(&self, user: &UserAnonymized) -> anyhow::Result<Vec<Goal>>;

    /// Activity categories a network category or app label belongs to
    async fn categories_matching(&self, label: &str) -> anyhow::Result<BTreeSet<Uuid>>;
}

/// Fans an event out to the goals it affects
pub struct GoalMatcher {
    lookup: Arc<dyn GoalLookup>,
}

impl GoalMatcher {
    pub fn new(lookup: Arc<dyn GoalLookup>) -> Self {
        Self { lookup }
    }

    /// Activity categories for a set of labels
    pub async fn categories_for<'a, I>(&self, labels: I) -> AnalysisResult<BTreeSet<Uuid>>
    where
        I: IntoIterator<Item = &'a str> + Send,
        I::IntoIter: Send,
    {
        let mut categories = BTreeSet::new();
        for label in labels {
            let matched = self
                .lookup
                .categories_matching(label)
                .await
                .map_err(|e| AnalysisError::goal_lookup(&e))?;
            categories.extend(matched);
        }
        Ok(categories)
    }

    /// Goals of `user` affected by activity on `labels` observed at `observed_at`
    ///
    /// Goals that only became active after the activity are left out.
    #[instrument(skip(self, user, labels), fields(user_anonymized_id = %user.id))]
    pub async fn matching_goals<'a, I>(
        &self,
        user: &UserAnonymized,
        labels: I,
        observed_at: DateTime<Utc>,
    ) -> AnalysisResult<Vec<Goal>>
    where
        I: IntoIterator<Item = &'a str> + Send,
        I::IntoIter: Send,
    {
        let categories = self.categories_for(labels).await?;
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let goals = self
            .lookup
            .active_goals_for(user)
            .await
            .map_err(|e| AnalysisError::goal_lookup(&e))?;

        let matched: Vec<Goal> = goals
            .into_iter()
            .filter(|goal| categories.contains(&goal.activity_category_id))
            .filter(|goal| goal.was_active_at(observed_at))
            .collect();

        debug!(
            categories = categories.len(),
            goals_matched = matched.len(),
            "Matched event to goals"
        );
        Ok(matched)
    }
}
