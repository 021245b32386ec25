//! Cache consistency tests
//!
//! Verify that late-arriving events for older days go to storage without
//! touching the cache, that later days replace the cached day, and that
//! concurrent events for one (user, goal) never interleave.

use std::sync::Arc;

use chrono::Weekday;

use activity_analysis::models::NetworkActivityEvent;
use activity_analysis::MergeOutcome;

use super::test_utils::*;

#[tokio::test]
async fn test_following_day_creates_fresh_state() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 5, 0)).await?;
    let report = context.app_event(POKER_APP, at(8, 9, 0, 0), at(8, 9, 5, 0)).await?;

    assert!(matches!(
        report.outcomes[0].outcome,
        MergeOutcome::Created { day_created: true, .. }
    ));
    // no day lookup needed for a later day
    assert_eq!(context.store.day_reads(), 0);

    let cached = context
        .service
        .cache()
        .peek(context.user.id, context.no_go_goal.id)
        .await
        .unwrap();
    assert_eq!(cached.date, date(8));
    assert_eq!(context.no_go_days().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_preceding_day_reads_storage_and_keeps_cache(
) -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;
    context.app_event(POKER_APP, at(8, 10, 0, 0), at(8, 10, 2, 0)).await?;

    // late event for the 7th, within the combine interval of its last activity
    let report = context.app_event(POKER_APP, at(7, 10, 3, 0), at(7, 10, 4, 0)).await?;

    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Extended { .. }));
    assert_eq!(report.outcomes[0].date, date(7));
    assert_eq!(context.store.day_reads(), 1);

    let days = context.no_go_days().await;
    assert_eq!(days[0].date, date(7));
    assert_eq!(days[0].activities()[0].end_time, at(7, 10, 4, 0));

    // the cache still holds the newer day, untouched
    let cached = context
        .service
        .cache()
        .peek(context.user.id, context.no_go_goal.id)
        .await
        .unwrap();
    assert_eq!(cached.date, date(8));
    assert_eq!(cached.activities()[0].end_time, at(8, 10, 2, 0));

    // the current day is served from the cache again
    let report = context.app_event(POKER_APP, at(8, 10, 3, 0), at(8, 10, 4, 0)).await?;
    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Extended { .. }));
    assert_eq!(context.store.day_reads(), 1);
    Ok(())
}

#[tokio::test]
async fn test_preceding_day_without_record_is_created() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(8, 10, 0, 0), at(8, 10, 2, 0)).await?;
    let report = context.app_event(POKER_APP, at(6, 10, 0, 0), at(6, 10, 2, 0)).await?;

    assert!(matches!(
        report.outcomes[0].outcome,
        MergeOutcome::Created { day_created: true, .. }
    ));
    let dates: Vec<_> = context.no_go_days().await.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![date(6), date(8)]);

    let cached = context
        .service
        .cache()
        .peek(context.user.id, context.no_go_goal.id)
        .await
        .unwrap();
    assert_eq!(cached.date, date(8));
    Ok(())
}

#[tokio::test]
async fn test_restart_continues_from_storage() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;
    assert_eq!(context.store.last_day_reads(), 1);

    // losing the cache must not lose the ongoing activity
    assert_eq!(context.service.invalidate_user(context.user.id).await, 1);
    let report = context.app_event(POKER_APP, at(7, 10, 3, 0), at(7, 10, 4, 0)).await?;

    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Extended { .. }));
    assert_eq!(context.store.last_day_reads(), 2);
    assert_eq!(context.no_go_days().await[0].activities().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_for_same_goal() -> Result<(), Box<dyn std::error::Error>> {
    let context = Arc::new(AnalysisTestContext::new());
    let seen = at(7, 10, 0, 0);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let context = Arc::clone(&context);
            tokio::spawn(async move {
                let event = NetworkActivityEvent::new([GAMBLING], "http://poker.example").at(seen);
                context
                    .service
                    .analyze_network_activity(&context.user, &event)
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let report = handle.await??;
        created += report.created_count();
    }

    // exactly one activity, no lost or duplicated creation
    assert_eq!(created, 1);
    let days = context.no_go_days().await;
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].activities().len(), 1);
    assert_eq!(context.no_go_weeks().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_week_save_is_retried_with_stored_day(
) -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;

    context.store.fail_next_week_save();
    assert!(context
        .app_event(POKER_APP, at(8, 9, 0, 0), at(8, 9, 30, 0))
        .await
        .is_err());

    // the day made it to storage and the cache before the week failed
    let cached = context
        .service
        .cache()
        .peek(context.user.id, context.no_go_goal.id)
        .await
        .unwrap();
    assert_eq!(cached.date, date(8));

    let report = context.app_event(POKER_APP, at(8, 20, 0, 0), at(8, 20, 5, 0)).await?;
    assert!(matches!(
        report.outcomes[0].outcome,
        MergeOutcome::Created { day_created: false, .. }
    ));

    let days = context.no_go_days().await;
    assert_eq!(days.len(), 2);
    assert_eq!(days[1].date, date(8));
    assert_eq!(days[1].activities().len(), 2);

    let weeks = context.no_go_weeks().await;
    assert_eq!(weeks.len(), 1);
    assert_eq!(weeks[0].day_id(Weekday::Tue), Some(days[0].id));
    assert_eq!(weeks[0].day_id(Weekday::Wed), Some(days[1].id));
    Ok(())
}
