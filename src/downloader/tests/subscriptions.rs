use super::*;
use chrono::Local;

async fn enable(ctx: &TestContext, category: &str, hourly: i64, daily: i64) {
    ctx.downloader
        .update_subscription(category, true, hourly, daily)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_run_missing_subscription() {
    let ctx = create_test_downloader().await;
    let err = ctx.downloader.run_subscription("daily").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Subscription(SubscriptionError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_run_disabled_subscription() {
    let ctx = create_test_downloader().await;
    ctx.downloader
        .update_subscription("daily", false, 5, 10)
        .await
        .unwrap();

    let err = ctx.downloader.run_subscription("daily").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Subscription(SubscriptionError::Disabled { .. })
    ));
}

#[tokio::test]
async fn test_exhausted_quota_starts_nothing_but_stamps_last_run() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "daily", 2, 10).await;
    ctx.library.set_feed("daily", vec![feed_item("Q-1")]);
    for _ in 0..2 {
        ctx.downloader
            .db
            .increment_windows("daily", &Local::now())
            .await
            .unwrap();
    }

    let err = ctx.downloader.run_subscription("daily").await.unwrap_err();
    match err {
        Error::Subscription(SubscriptionError::QuotaExceeded {
            hourly_used,
            hourly_limit,
            ..
        }) => {
            assert_eq!(hourly_used, 2);
            assert_eq!(hourly_limit, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }

    let stats = ctx.downloader.get_task_stats().await.unwrap();
    assert_eq!(stats.total, 0);
    let subs = ctx.downloader.get_subscriptions().await.unwrap();
    assert!(subs[0].last_run_at.is_some());
    assert_eq!(subs[0].total_downloads, 0);
}

#[tokio::test]
async fn test_run_starts_up_to_budget_in_rank_order() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "weekly", 3, 10).await;
    ctx.downloader
        .db
        .increment_windows("weekly", &Local::now())
        .await
        .unwrap();
    ctx.library.set_feed(
        "weekly",
        vec![
            feed_item("W-1"),
            feed_item("W-2"),
            feed_item("W-3"),
            feed_item("W-4"),
        ],
    );

    let summary = ctx.downloader.run_subscription("weekly").await.unwrap();

    assert_eq!(summary.budget, 2);
    assert_eq!(summary.started, vec!["W-1", "W-2"]);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.limits.hourly_used, 3);
    assert_eq!(summary.limits.daily_used, 3);
    assert!(!summary.limits.can_download);

    let task = ctx.downloader.get_task_by_code("W-1").await.unwrap();
    assert_eq!(task.source, TaskSource::Subscription);
    assert_eq!(task.category, "weekly");
    assert!(ctx.downloader.get_task_by_code("W-3").await.is_err());

    let subs = ctx.downloader.get_subscriptions().await.unwrap();
    assert_eq!(subs[0].total_downloads, 2);
    wait_idle(&ctx.downloader).await;
}

#[tokio::test]
async fn test_run_skips_owned_and_active_items() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "daily", 10, 10).await;
    ctx.indexer.set_delay(std::time::Duration::from_millis(300));

    let active = ctx.downloader.start_task(manual("D-2")).await.unwrap();
    ctx.library.own("D-3");

    let mut flagged = feed_item("D-1");
    flagged.locally_owned = true;
    ctx.library.set_feed(
        "daily",
        vec![flagged, feed_item("D-2"), feed_item("D-3"), feed_item("D-4")],
    );

    let summary = ctx.downloader.run_subscription("daily").await.unwrap();

    assert_eq!(summary.started, vec!["D-4"]);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.limits.hourly_used, 1);

    // the manual task was left alone
    let task = ctx.downloader.get_task(active.id).await.unwrap();
    assert_eq!(task.source, TaskSource::Manual);
    wait_idle(&ctx.downloader).await;
}

#[tokio::test]
async fn test_run_emits_event_and_summary_notification() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "monthly", 5, 5).await;
    ctx.library.set_feed("monthly", vec![feed_item("M-1")]);
    let mut events = ctx.downloader.subscribe();

    ctx.downloader.run_subscription("monthly").await.unwrap();

    let mut saw_run = false;
    while let Ok(event) = events.try_recv() {
        if let Event::SubscriptionRun { summary } = event {
            assert_eq!(summary.started, vec!["M-1"]);
            saw_run = true;
        }
    }
    assert!(saw_run);

    wait_idle(&ctx.downloader).await;
    let notes = wait_for_notifications(&ctx.notifier, 2).await;
    assert!(notes.contains(&"summary:monthly:M-1".to_string()), "{notes:?}");
}

#[tokio::test]
async fn test_update_subscription_validates_limits() {
    let ctx = create_test_downloader().await;

    for (hourly, daily) in [(0, 5), (5, 0), (-1, 5)] {
        let err = ctx
            .downloader
            .update_subscription("daily", true, hourly, daily)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "{hourly}/{daily}");
    }

    let sub = ctx
        .downloader
        .update_subscription("daily", true, 4, 8)
        .await
        .unwrap();
    assert!(sub.enabled);
    assert_eq!(sub.hourly_limit, 4);
    assert_eq!(sub.daily_limit, 8);
}

#[tokio::test]
async fn test_status_provisions_disabled_default() {
    let ctx = create_test_downloader().await;

    let status = ctx.downloader.get_subscription_status("rookie").await.unwrap();

    assert!(!status.subscription.enabled);
    assert_eq!(status.subscription.hourly_limit, 10);
    assert_eq!(status.subscription.daily_limit, 50);
    assert_eq!(status.limits.hourly_used, 0);
    assert!(status.limits.can_download);
    assert_eq!(ctx.downloader.get_subscriptions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_reports_window_usage() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "daily", 1, 10).await;
    ctx.downloader
        .db
        .increment_windows("daily", &Local::now())
        .await
        .unwrap();

    let status = ctx.downloader.get_subscription_status("daily").await.unwrap();
    assert_eq!(status.limits.hourly_used, 1);
    assert_eq!(status.limits.daily_used, 1);
    assert!(!status.limits.can_download);
}

#[tokio::test]
async fn test_delete_subscription() {
    let ctx = create_test_downloader().await;
    enable(&ctx, "daily", 1, 1).await;

    ctx.downloader.delete_subscription("daily").await.unwrap();
    let err = ctx.downloader.delete_subscription("daily").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Subscription(SubscriptionError::NotFound { .. })
    ));
}
