//! SQLite store integration tests
//!
//! Runs the analysis service on an in-memory SQLite database and checks that
//! a fresh service over the same database continues where the first left off.

use chrono_tz::Tz;
use std::sync::Arc;

use activity_analysis::database::{ActivityStore, DatabaseManager, SqliteActivityStore};
use activity_analysis::models::{AppActivity, AppActivityBatch};
use activity_analysis::services::MockTimeProvider;
use activity_analysis::{ActivityAnalysisService, MergeOutcome};

use super::test_utils::*;

#[tokio::test]
async fn test_analysis_survives_service_restart() -> Result<(), Box<dyn std::error::Error>> {
    let database = DatabaseManager::in_memory().await?;
    let store = Arc::new(SqliteActivityStore::new(database));

    // reuse the context's user, goals and lookup wiring, swapping in SQLite
    let context = AnalysisTestContext::new();
    let lookup = Arc::new(
        StaticGoalLookup::default().with_label(POKER_APP, context.no_go_goal.activity_category_id),
    );
    let time_provider = Arc::new(MockTimeProvider::new(at(7, 12, 0, 0)));

    let batch = |start, end| AppActivityBatch {
        device_date_time: at(7, 12, 0, 0),
        device_id: None,
        activities: vec![AppActivity {
            application: POKER_APP.to_string(),
            start_time: start,
            end_time: end,
        }],
    };

    let first = ActivityAnalysisService::new(
        scenario_config(),
        store.clone(),
        lookup.clone(),
        context.dispatcher.clone(),
        time_provider.clone(),
    )?;
    first
        .analyze_app_activity(&context.user, &batch(at(7, 10, 0, 0), at(7, 10, 2, 0)))
        .await?;

    let restarted = ActivityAnalysisService::new(
        scenario_config(),
        store.clone(),
        lookup,
        context.dispatcher.clone(),
        time_provider,
    )?;
    let report = restarted
        .analyze_app_activity(&context.user, &batch(at(7, 10, 3, 0), at(7, 10, 4, 0)))
        .await?;

    assert!(matches!(report.outcomes[0].outcome, MergeOutcome::Extended { .. }));

    let day = store
        .find_day_activity(context.user.id, context.no_go_goal.id, date(7))
        .await?
        .expect("day activity stored");
    assert_eq!(day.activities().len(), 1);
    assert_eq!(day.activities()[0].end_time, at(7, 10, 4, 0));
    assert_eq!(day.time_zone, Tz::UTC);

    let week = store
        .find_week_activity(context.user.id, context.no_go_goal.id, date(5))
        .await?
        .expect("week activity stored");
    assert_eq!(week.days().get(&date(7)), Some(&day.id));
    Ok(())
}
