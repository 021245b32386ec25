//! Day Activity Cache
//!
//! Process-wide cache of the most recently touched day activity per
//! (user, goal). Each key owns an async mutex; holding its guard is the
//! exclusive section for every lookup-then-mutate sequence on that key.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::models::day_activity::DayActivity;

/// Cache key: anonymized user id and goal id
pub type CacheKey = (Uuid, Uuid);

/// Cached state for one key
#[derive(Debug, Default)]
pub struct CacheSlot {
    day: Option<DayActivity>,
    loaded: bool,
    week_pending: bool,
}

impl CacheSlot {
    /// The cached day activity, if any
    pub fn day(&self) -> Option<&DayActivity> {
        self.day.as_ref()
    }

    /// Whether storage has been consulted for this key since it was created
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Seed the slot with what storage holds as the last day activity
    ///
    /// A day read back from storage has its week membership checked once.
    pub fn load(&mut self, day: Option<DayActivity>) {
        self.week_pending = day.is_some();
        self.day = day;
        self.loaded = true;
    }

    /// Make `day` the cached day activity
    ///
    /// Switching to a different day marks it as not yet attached to its week.
    pub fn replace(&mut self, day: DayActivity) {
        if self.day.as_ref().map(|cached| cached.id) != Some(day.id) {
            self.week_pending = true;
        }
        self.day = Some(day);
        self.loaded = true;
    }

    /// Whether the cached day still has to be attached to its week
    pub fn is_week_pending(&self) -> bool {
        self.week_pending
    }

    pub fn mark_week_attached(&mut self) {
        self.week_pending = false;
    }

    /// Back to the state of a fresh key; the next lock reloads from storage
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-key locked cache of day activities
#[derive(Debug, Default)]
pub struct DayActivityCache {
    slots: DashMap<CacheKey, Arc<Mutex<CacheSlot>>>,
}

impl DayActivityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive section for (user, goal)
    ///
    /// The returned guard must be held until the cache has been updated.
    pub async fn lock(
        &self,
        user_anonymized_id: Uuid,
        goal_id: Uuid,
    ) -> OwnedMutexGuard<CacheSlot> {
        let slot = self
            .slots
            .entry((user_anonymized_id, goal_id))
            .or_default()
            .value()
            .clone();
        slot.lock_owned().await
    }

    /// Snapshot of the cached day activity for (user, goal)
    pub async fn peek(&self, user_anonymized_id: Uuid, goal_id: Uuid) -> Option<DayActivity> {
        let slot = self
            .slots
            .get(&(user_anonymized_id, goal_id))
            .map(|entry| Arc::clone(entry.value()))?;
        let guard = slot.lock().await;
        guard.day().cloned()
    }

    /// Reset every slot of a user, returning how many were reset
    ///
    /// Each slot is reset under its own guard, so a merge in progress for the
    /// user finishes first and later merges reload from storage.
    pub async fn invalidate_user(&self, user_anonymized_id: Uuid) -> usize {
        let slots: Vec<_> = self
            .slots
            .iter()
            .filter(|entry| entry.key().0 == user_anonymized_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for slot in &slots {
            slot.lock().await.reset();
        }
        debug!(
            user_anonymized_id = %user_anonymized_id,
            reset = slots.len(),
            "Invalidated day activity cache"
        );
        slots.len()
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
