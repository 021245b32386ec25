//! Conflict notification tests
//!
//! No-go goals notify the user once and every accepted buddy once per
//! change; budget goals never notify.

use chrono::Duration;

use activity_analysis::models::{BuddyAnonymized, BuddyStatus, NetworkActivityEvent};
use activity_analysis::AnalysisConfig;

use super::test_utils::*;

#[tokio::test]
async fn test_no_go_notifies_user_and_accepted_buddies() -> Result<(), Box<dyn std::error::Error>> {
    let mut context = AnalysisTestContext::new();
    context.user = context
        .user
        .clone()
        .with_buddy(BuddyAnonymized::accepted(uuid::Uuid::new_v4()))
        .with_buddy(BuddyAnonymized {
            id: uuid::Uuid::new_v4(),
            anonymous_destination_id: uuid::Uuid::new_v4(),
            sending_status: BuddyStatus::Requested,
        });

    let event = NetworkActivityEvent::new([GAMBLING, "casino"], "http://poker.example/table/7")
        .at(at(7, 10, 0, 0));
    let report = context.service.analyze_network_activity(&context.user, &event).await?;

    assert_eq!(report.conflicts_dispatched(), 1);

    let own = context.dispatcher.self_notifications();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].destination, context.user.anonymous_destination_id);
    assert_eq!(own[0].notification.goal_id, context.no_go_goal.id);
    assert_eq!(
        own[0].notification.activity_category_id,
        context.no_go_goal.activity_category_id
    );
    assert_eq!(
        own[0].notification.url.as_deref(),
        Some("http://poker.example/table/7")
    );

    let buddies = context.dispatcher.buddy_notifications();
    let accepted: Vec<_> = context
        .user
        .accepted_buddies()
        .map(|b| b.anonymous_destination_id)
        .collect();
    assert_eq!(buddies.len(), 2);
    for delivery in &buddies {
        assert!(accepted.contains(&delivery.destination));
        assert!(delivery.notification.url.is_none());
        assert_eq!(delivery.notification.activity, own[0].notification.activity);
    }
    Ok(())
}

#[tokio::test]
async fn test_budget_goal_never_notifies() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    context.app_event(CHAT_APP, at(7, 10, 0, 0), at(7, 10, 40, 0)).await?;
    let report = context.app_event(CHAT_APP, at(7, 10, 42, 0), at(7, 11, 30, 0)).await?;

    assert_eq!(report.extended_count(), 1);
    assert!(context.dispatcher.deliveries().is_empty());

    let day = context
        .store
        .inner
        .day_activities(context.user.id, context.budget_goal.id)
        .await
        .remove(0);
    assert_eq!(day.total_activity_duration_minutes(), 90);
    assert!(!day.is_goal_accomplished(&context.budget_goal));
    assert_eq!(day.total_minutes_beyond_goal(&context.budget_goal), 60);
    Ok(())
}

#[tokio::test]
async fn test_network_event_without_time_uses_server_clock(
) -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();
    let now = context.time_provider.current_time();

    let event = NetworkActivityEvent::new([GAMBLING], "http://poker.example");
    context.service.analyze_network_activity(&context.user, &event).await?;

    let activity = context.no_go_days().await[0].activities()[0].clone();
    assert_eq!(activity.start_time, now);
    assert_eq!(activity.end_time, now + Duration::minutes(1));
    Ok(())
}

#[tokio::test]
async fn test_long_url_is_truncated() -> Result<(), Box<dyn std::error::Error>> {
    let config = AnalysisConfig {
        max_url_length: 32,
        ..scenario_config()
    };
    let context = AnalysisTestContext::with_config(config, chrono_tz::Tz::UTC);
    let url = format!("http://poker.example/{}", "x".repeat(100));

    let event = NetworkActivityEvent::new([GAMBLING], &url).at(at(7, 10, 0, 0));
    context.service.analyze_network_activity(&context.user, &event).await?;

    let own = context.dispatcher.self_notifications();
    assert_eq!(own[0].notification.url.as_deref(), Some(&url[..32]));
    Ok(())
}

#[tokio::test]
async fn test_repeated_hits_within_skip_window_do_not_notify(
) -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    for seconds in [0, 20, 40, 59] {
        let event = NetworkActivityEvent::new([GAMBLING], "http://poker.example")
            .at(at(7, 10, 0, seconds));
        context.service.analyze_network_activity(&context.user, &event).await?;
    }

    // the first hit creates a one-minute activity that absorbs the rest
    assert_eq!(context.dispatcher.self_notifications().len(), 1);
    assert_eq!(context.no_go_days().await[0].activities().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_categories_are_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let context = AnalysisTestContext::new();

    let event = NetworkActivityEvent::new(Vec::<String>::new(), "http://example.com");
    let report = context.service.analyze_network_activity(&context.user, &event).await?;

    assert!(report.is_empty());
    assert!(context.dispatcher.deliveries().is_empty());
    Ok(())
}
