mod helpers;

use chrono::Utc;
use helpers::{
    count, new_request, object_scope, seed_file, seed_institution, seed_object, setup_test_db,
    work_item,
};
use registry_core::models::{Action, Stage, WorkItemStatus};
use registry_core::AppError;
use registry_db::{
    DeletionRequestRepository, DeletionRequestStore, PendingScope, WorkItemRepository,
    WorkItemStore,
};

#[tokio::test]
async fn test_pending_work_blocks_deletion_request() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let requests = DeletionRequestRepository::new(db.pool.clone());

    let mut ingest = work_items
        .insert(&work_item(10, 1, Action::Ingest, Stage::Store, WorkItemStatus::Started))
        .await
        .unwrap();

    let err = requests
        .create_if_no_pending_work(new_request(1, vec![10]), &[object_scope(10, 1)])
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::PendingWork(_)));
    assert_eq!(count(&db.pool, "deletion_requests").await, 0);
    assert_eq!(count(&db.pool, "deletion_requests_intellectual_objects").await, 0);

    ingest.stage = Stage::Cleanup;
    ingest.status = WorkItemStatus::Success;
    work_items.update(&ingest).await.unwrap();

    let created = requests
        .create_if_no_pending_work(new_request(1, vec![10]), &[object_scope(10, 1)])
        .await
        .unwrap();
    assert_eq!(created.intellectual_object_ids, vec![10]);
    assert!(created.generic_file_ids.is_empty());
    assert!(created.is_pending());
    assert!(created.confirmation_token().is_none());
}

#[tokio::test]
async fn test_file_scope_sees_work_on_the_file() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    seed_file(&db.pool, 11, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let requests = DeletionRequestRepository::new(db.pool.clone());

    let mut restore = work_item(10, 1, Action::RestoreFile, Stage::Requested, WorkItemStatus::Pending);
    restore.name = "renamed-bag".to_string();
    restore.generic_file_id = Some(11);
    work_items.insert(&restore).await.unwrap();

    let scope = PendingScope {
        generic_file_id: Some(11),
        ..object_scope(10, 1)
    };
    let mut new = new_request(1, Vec::new());
    new.generic_file_ids = vec![11];
    let err = requests
        .create_if_no_pending_work(new, &[scope])
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::PendingWork(_)));
    assert_eq!(count(&db.pool, "deletion_requests").await, 0);
}

#[tokio::test]
async fn test_second_confirmation_is_refused() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let requests = DeletionRequestRepository::new(db.pool.clone());

    let request = requests
        .create_if_no_pending_work(new_request(1, vec![10]), &[object_scope(10, 1)])
        .await
        .unwrap();

    let first = requests
        .mark_confirmed(request.id, 101, Utc::now())
        .await
        .unwrap();
    assert_eq!(first.confirmed_by_id, Some(101));
    assert!(first.confirmed_at.is_some());

    let err = requests
        .mark_confirmed(request.id, 151, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::AlreadyApproved(id) if id == request.id));

    let err = requests
        .mark_cancelled(request.id, 151, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::AlreadyApproved(_)));

    let stored = requests.get(request.id).await.unwrap().unwrap();
    assert_eq!(stored.confirmed_by_id, Some(101));
    assert_eq!(stored.confirmed_at, first.confirmed_at);
    assert!(stored.cancelled_at.is_none());
    assert!(stored.cancelled_by_id.is_none());
}

#[tokio::test]
async fn test_cancelled_request_cannot_be_confirmed() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let requests = DeletionRequestRepository::new(db.pool.clone());

    let request = requests
        .create_if_no_pending_work(new_request(1, vec![10]), &[object_scope(10, 1)])
        .await
        .unwrap();
    requests
        .mark_cancelled(request.id, 101, Utc::now())
        .await
        .unwrap();

    let err = requests
        .mark_confirmed(request.id, 151, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::AlreadyCancelled(_)));

    let err = requests
        .mark_confirmed(9999, 101, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(AppError::from(err), AppError::NotFound(_)));
}

#[tokio::test]
async fn test_find_stranded_lists_confirmed_requests_without_work() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    seed_object(&db.pool, 20, 1).await;
    seed_object(&db.pool, 30, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let requests = DeletionRequestRepository::new(db.pool.clone());

    let mut ids = Vec::new();
    for object_id in [10, 20, 30] {
        let request = requests
            .create_if_no_pending_work(new_request(1, vec![object_id]), &[object_scope(object_id, 1)])
            .await
            .unwrap();
        ids.push(request.id);
    }
    let (dispatched, stranded, pending) = (ids[0], ids[1], ids[2]);

    let err = requests.set_work_item_id(pending, 1).await.unwrap_err();
    assert!(matches!(AppError::from(err), AppError::NotSupported(_)));

    requests.mark_confirmed(dispatched, 101, Utc::now()).await.unwrap();
    requests.mark_confirmed(stranded, 101, Utc::now()).await.unwrap();

    let mut delete = work_item(10, 1, Action::Delete, Stage::Requested, WorkItemStatus::Pending);
    delete.deletion_request_id = Some(dispatched);
    let delete = work_items.insert(&delete).await.unwrap();
    requests.set_work_item_id(dispatched, delete.id).await.unwrap();

    let found = requests.find_stranded().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, stranded);
    assert_eq!(found[0].intellectual_object_ids, vec![20]);
    assert!(found[0].is_stranded());

    let listed = work_items.list_for_deletion_request(dispatched).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, delete.id);
}

#[tokio::test]
async fn test_concurrent_guarded_inserts_admit_one() {
    let db = setup_test_db().await;
    seed_institution(&db.pool, 1).await;
    seed_object(&db.pool, 10, 1).await;
    let work_items = WorkItemRepository::new(db.pool.clone());
    let scope = object_scope(10, 1);
    let item = work_item(10, 1, Action::RestoreObject, Stage::Requested, WorkItemStatus::Pending);

    let (first, second) = tokio::join!(
        work_items.insert_if_no_pending_work(&item, &scope),
        work_items.insert_if_no_pending_work(&item, &scope),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let refused = outcomes.into_iter().find_map(|r| r.err()).unwrap();
    assert!(matches!(AppError::from(refused), AppError::PendingWork(_)));
    assert_eq!(count(&db.pool, "work_items").await, 1);
}
