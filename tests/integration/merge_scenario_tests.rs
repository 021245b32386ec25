//! Merge engine scenarios
//!
//! Tests the combine, skip-window, minimum-duration and ordering rules through
//! the public analysis entry points.

use chrono::Duration;

use activity_analysis::models::{AppActivity, AppActivityBatch};
use activity_analysis::{AnalysisError, ConflictNotificationPolicy, MergeOutcome};

use super::test_utils::*;

/// No-go gambling goal, combine interval 5 min, skip window 5 s
#[tokio::test]
async fn test_gambling_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    // Event A: new activity, conflict sent
    let report = context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;
    assert_eq!(report.created_count(), 1);
    assert_eq!(report.conflicts_dispatched(), 1);

    // Event B: one minute gap, combined and extended to 10:04
    let report = context.app_event(POKER_APP, at(7, 10, 3, 0), at(7, 10, 4, 0)).await?;
    assert_eq!(report.extended_count(), 1);
    assert_eq!(report.outcomes[0].outcome.activity().end_time, at(7, 10, 4, 0));

    // Event C: eleven minute gap, separate activity
    let report = context.app_event(POKER_APP, at(7, 10, 15, 0), at(7, 10, 16, 0)).await?;
    assert_eq!(report.created_count(), 1);
    assert_eq!(report.conflicts_dispatched(), 1);

    let days = context.no_go_days().await;
    assert_eq!(days.len(), 1);
    let intervals: Vec<_> = days[0]
        .activities()
        .iter()
        .map(|a| (a.start_time, a.end_time))
        .collect();
    assert_eq!(
        intervals,
        vec![
            (at(7, 10, 0, 0), at(7, 10, 4, 0)),
            (at(7, 10, 15, 0), at(7, 10, 16, 0)),
        ]
    );

    // default policy also notifies on the persisted extension of B
    assert_eq!(context.dispatcher.self_notifications().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_new_activity_policy_skips_extensions() -> Result<(), Box<dyn std::error::Error>> {
    let config = activity_analysis::AnalysisConfig {
        conflict_policy: ConflictNotificationPolicy::OnNewActivity,
        ..scenario_config()
    };
    let context = AnalysisTestContext::with_config(config, chrono_tz::Tz::UTC);

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;
    let report = context.app_event(POKER_APP, at(7, 10, 3, 0), at(7, 10, 4, 0)).await?;
    context.app_event(POKER_APP, at(7, 10, 15, 0), at(7, 10, 16, 0)).await?;

    assert_eq!(report.extended_count(), 1);
    assert_eq!(report.conflicts_dispatched(), 0);
    assert_eq!(context.dispatcher.self_notifications().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_combine_threshold_just_inside() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let last_end = at(7, 10, 2, 0);

    context.app_event(POKER_APP, at(7, 10, 0, 0), last_end).await?;
    let start = last_end + Duration::minutes(5) - Duration::milliseconds(1);
    let report = context
        .app_event(POKER_APP, start, start + Duration::minutes(1))
        .await?;

    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Extended { .. }));
    assert_eq!(context.no_go_days().await[0].activities().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_combine_threshold_just_outside() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let last_end = at(7, 10, 2, 0);

    context.app_event(POKER_APP, at(7, 10, 0, 0), last_end).await?;
    let start = last_end + Duration::minutes(5) + Duration::milliseconds(1);
    let report = context
        .app_event(POKER_APP, start, start + Duration::minutes(1))
        .await?;

    assert!(matches!(
        report.outcomes[0].outcome,
        MergeOutcome::Created { day_created: false, .. }
    ));
    assert_eq!(context.no_go_days().await[0].activities().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_skip_window() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 2, 0)).await?;
    let writes = context.store.day_writes();
    let notifications = context.dispatcher.deliveries().len();

    // 4 s of growth is absorbed: no write, no notification
    let report = context.app_event(POKER_APP, at(7, 10, 1, 0), at(7, 10, 2, 4)).await?;
    assert_eq!(report.absorbed_count(), 1);
    assert_eq!(report.conflicts_dispatched(), 0);
    assert_eq!(context.store.day_writes(), writes);
    assert_eq!(context.dispatcher.deliveries().len(), notifications);
    assert_eq!(context.no_go_days().await[0].activities()[0].end_time, at(7, 10, 2, 0));

    // 5 s of growth is persisted
    let report = context.app_event(POKER_APP, at(7, 10, 1, 0), at(7, 10, 2, 5)).await?;
    assert_eq!(report.extended_count(), 1);
    assert_eq!(context.store.day_writes(), writes + 1);
    assert_eq!(context.no_go_days().await[0].activities()[0].end_time, at(7, 10, 2, 5));
    Ok(())
}

#[tokio::test]
async fn test_minimum_duration() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 0, 10)).await?;

    let activity = context.no_go_days().await[0].activities()[0].clone();
    assert_eq!(activity.start_time, at(7, 10, 0, 0));
    assert_eq!(activity.end_time, at(7, 10, 1, 0));
    assert!(activity.duration() >= Duration::minutes(1));
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_event_never_combines() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(POKER_APP, at(7, 10, 0, 0), at(7, 10, 10, 0)).await?;
    // starts before the last activity and overlaps it
    let report = context.app_event(POKER_APP, at(7, 9, 58, 0), at(7, 10, 5, 0)).await?;

    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Created { .. }));
    let days = context.no_go_days().await;
    let starts: Vec<_> = days[0].activities().iter().map(|a| a.start_time).collect();
    assert_eq!(starts, vec![at(7, 9, 58, 0), at(7, 10, 0, 0)]);
    Ok(())
}

#[tokio::test]
async fn test_batch_processed_in_start_order() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let batch = AppActivityBatch {
        device_date_time: context.time_provider.current_time(),
        device_id: None,
        activities: vec![
            AppActivity {
                application: POKER_APP.to_string(),
                start_time: at(7, 10, 3, 0),
                end_time: at(7, 10, 4, 0),
            },
            AppActivity {
                application: POKER_APP.to_string(),
                start_time: at(7, 10, 0, 0),
                end_time: at(7, 10, 2, 0),
            },
        ],
    };

    let report = context.service.analyze_app_activity(&context.user, &batch).await?;

    assert_eq!(report.created_count(), 1);
    assert_eq!(report.extended_count(), 1);
    let days = context.no_go_days().await;
    assert_eq!(days[0].activities().len(), 1);
    assert_eq!(days[0].activities()[0].end_time, at(7, 10, 4, 0));
    Ok(())
}

#[tokio::test]
async fn test_clock_drift_is_corrected() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let now = context.time_provider.current_time();

    // device clock runs five minutes fast
    let batch = AppActivityBatch {
        device_date_time: now + Duration::minutes(5),
        device_id: None,
        activities: vec![AppActivity {
            application: POKER_APP.to_string(),
            start_time: at(7, 11, 5, 0),
            end_time: at(7, 11, 15, 0),
        }],
    };
    context.service.analyze_app_activity(&context.user, &batch).await?;

    let activity = context.no_go_days().await[0].activities()[0].clone();
    assert_eq!(activity.start_time, at(7, 11, 0, 0));
    assert_eq!(activity.end_time, at(7, 11, 10, 0));
    assert_eq!(activity.app.as_deref(), Some(POKER_APP));
    Ok(())
}

#[tokio::test]
async fn test_small_clock_drift_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let now = context.time_provider.current_time();

    let batch = AppActivityBatch {
        device_date_time: now + Duration::seconds(8),
        device_id: None,
        activities: vec![AppActivity {
            application: POKER_APP.to_string(),
            start_time: at(7, 11, 5, 0),
            end_time: at(7, 11, 15, 0),
        }],
    };
    context.service.analyze_app_activity(&context.user, &batch).await?;

    let activity = context.no_go_days().await[0].activities()[0].clone();
    assert_eq!(activity.start_time, at(7, 11, 5, 0));
    Ok(())
}

#[tokio::test]
async fn test_invalid_batch_is_rejected() {
    let context = AnalysisTestContext::new();

    let error = context
        .app_event(POKER_APP, at(7, 10, 5, 0), at(7, 10, 0, 0))
        .await
        .unwrap_err();

    assert!(matches!(error, AnalysisError::InvalidInput(_)));
    assert!(!error.is_server_error());
    assert!(context.no_go_days().await.is_empty());
}

#[tokio::test]
async fn test_unmatched_app_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    let report = context.app_event("Calculator", at(7, 10, 0, 0), at(7, 10, 5, 0)).await?;

    assert!(report.is_empty());
    assert_eq!(context.store.day_writes(), 0);
    Ok(())
}
