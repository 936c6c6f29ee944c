mod helpers;

use chrono::{Duration, Utc};
use helpers::{seed_file, seed_institution, seed_object, setup_test_db, work_item};
use registry_core::models::{Action, Alert, AlertType, Role, Stage, WorkItemStatus};
use registry_db::{
    AlertRepository, AlertStore, CatalogRepository, CatalogStore, WorkItemRepository,
    WorkItemStore,
};

#[tokio::test]
async fn test_last_successful_ingest_picks_latest_recorded_success() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    seed_object(&db.pool, 20, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let now = Utc::now();

    let mut older = work_item(10, 1, Action::Ingest, Stage::Cleanup, WorkItemStatus::Success);
    older.date_processed = now - Duration::days(90);
    work_items.insert(&older).await.unwrap();

    let mut latest = work_item(10, 1, Action::Ingest, Stage::Record, WorkItemStatus::Success);
    latest.date_processed = now - Duration::days(10);
    latest.etag = "fedcba9876543210fedcba9876543210".to_string();
    let latest = work_items.insert(&latest).await.unwrap();

    let mut failed = work_item(10, 1, Action::Ingest, Stage::Store, WorkItemStatus::Failed);
    failed.date_processed = now - Duration::days(1);
    work_items.insert(&failed).await.unwrap();

    let mut unfinished = work_item(10, 1, Action::Ingest, Stage::Validate, WorkItemStatus::Success);
    unfinished.date_processed = now;
    work_items.insert(&unfinished).await.unwrap();

    let found = work_items.last_successful_ingest(10).await.unwrap().unwrap();
    assert_eq!(found.id, latest.id);
    assert_eq!(found.etag, "fedcba9876543210fedcba9876543210");
    assert_eq!(found.stage, Stage::Record);

    assert!(work_items.last_successful_ingest(20).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pending_queries_follow_completion_rules() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    seed_file(&db.pool, 11, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());

    work_items
        .insert(&work_item(10, 1, Action::Ingest, Stage::Cleanup, WorkItemStatus::Success))
        .await
        .unwrap();
    let mut gave_up = work_item(10, 1, Action::Ingest, Stage::Store, WorkItemStatus::Failed);
    gave_up.retry = false;
    work_items.insert(&gave_up).await.unwrap();
    assert!(work_items.pending_for_object(1, "bag10").await.unwrap().is_empty());

    // A reingest of the same bag has no object id yet but still counts.
    let mut reingest = work_item(10, 1, Action::Ingest, Stage::Receive, WorkItemStatus::Failed);
    reingest.intellectual_object_id = None;
    reingest.retry = true;
    let reingest = work_items.insert(&reingest).await.unwrap();

    let pending = work_items.pending_for_object(1, "bag10").await.unwrap();
    assert_eq!(pending.iter().map(|i| i.id).collect::<Vec<_>>(), vec![reingest.id]);
    assert!(work_items.pending_for_object(2, "bag10").await.unwrap().is_empty());
    assert!(work_items.pending_for_file(11).await.unwrap().is_empty());

    let mut fixity = work_item(10, 1, Action::FixityCheck, Stage::Requested, WorkItemStatus::Started);
    fixity.generic_file_id = Some(11);
    let fixity = work_items.insert(&fixity).await.unwrap();
    let pending = work_items.pending_for_file(11).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, fixity.id);
    assert_eq!(pending[0].action, Action::FixityCheck);
}

#[tokio::test]
async fn test_update_and_mark_queued_round_trip() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());

    let mut item = work_items
        .insert(&work_item(10, 1, Action::Ingest, Stage::Store, WorkItemStatus::Failed))
        .await
        .unwrap();
    assert!(item.node.is_empty());
    assert!(item.queued_at.is_none());

    item.stage = Stage::ReingestCheck;
    item.status = WorkItemStatus::Pending;
    item.note = "Requeued for Reingest Check".to_string();
    item.retry = true;
    let updated = work_items.update(&item).await.unwrap();
    assert_eq!(updated.stage, Stage::ReingestCheck);
    assert_eq!(updated.status, WorkItemStatus::Pending);
    assert_eq!(updated.note, "Requeued for Reingest Check");

    work_items.mark_queued(item.id, Utc::now()).await.unwrap();
    let stored = work_items.get(item.id).await.unwrap().unwrap();
    assert!(stored.queued_at.is_some());
    assert!(work_items.get(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_institution_admins_skip_deactivated_and_plain_users() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_institution(&db.pool, 2).await;
    sqlx::query("UPDATE users SET deactivated_at = NOW() WHERE id = 151")
        .execute(&db.pool)
        .await
        .unwrap();
    let catalog = CatalogRepository::new(db.pool.clone());

    let admins = catalog.institution_admins(1).await.unwrap();
    assert_eq!(admins.iter().map(|u| u.id).collect::<Vec<_>>(), vec![101]);
    assert_eq!(admins[0].role, Role::InstAdmin);

    let deactivated = catalog.get_user(151).await.unwrap().unwrap();
    assert!(deactivated.deactivated_at.is_some());
    assert_eq!(catalog.get_institution(2).await.unwrap().unwrap().name, "Institution 2");
}

#[tokio::test]
async fn test_alert_recipients_are_marked_sent() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let catalog = CatalogRepository::new(db.pool.clone());
    let alerts = AlertRepository::new(db.pool.clone());

    let item = work_items
        .insert(&work_item(10, 1, Action::RestoreObject, Stage::Requested, WorkItemStatus::Pending))
        .await
        .unwrap();
    let mut alert = Alert::new(1, AlertType::RestorationRequested, "Restoration Requested");
    alert.content = "bag10 is being restored".to_string();
    alert.work_item_ids = vec![item.id];
    alert.recipients = catalog.institution_admins(1).await.unwrap();

    let saved = alerts.insert(&alert).await.unwrap();
    assert!(saved.id > 0);
    alerts.mark_sent(saved.id, 101, Utc::now()).await.unwrap();

    let rows: Vec<(i64, bool)> = sqlx::query_as(
        "SELECT user_id, sent_at IS NOT NULL FROM alerts_users WHERE alert_id = $1 ORDER BY user_id",
    )
    .bind(saved.id)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(rows, vec![(101, true), (151, false)]);

    let linked: Vec<i64> =
        sqlx::query_scalar("SELECT work_item_id FROM alerts_work_items WHERE alert_id = $1")
            .bind(saved.id)
            .fetch_all(&db.pool)
            .await
            .unwrap();
    assert_eq!(linked, vec![item.id]);
}
