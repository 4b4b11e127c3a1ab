//! Attachment writes against SQLite and the filesystem blob store.

mod common;

use tokio_util::sync::CancellationToken;
use workdesk_types::error::ResourceError;
use workdesk_types::estimate::{EstimatePatch, NewEstimate};
use workdesk_types::identity::Caller;
use workdesk_types::work_order::{CreateWorkOrderRequest, WorkOrderPatch, WorkOrderStatus};

use common::{FailingBlobs, harness, harness_with, png};

fn request(description: &str) -> CreateWorkOrderRequest {
    CreateWorkOrderRequest {
        description: description.to_string(),
        location: Some("Kitchen".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn failed_upload_leaves_no_row_and_no_blob() {
    let h = harness_with(FailingBlobs::wrap("broken.png")).await;
    let service = h.work_order_service();

    let err = service
        .create(
            Caller::user(7),
            request("Cracked tiles"),
            vec![png("one.png"), png("two.png"), png("broken.png")],
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::Storage(_)));
    assert_eq!(h.count_rows("work_orders").await, 0);
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
async fn cancelled_create_is_rolled_back() {
    let h = harness().await;
    let service = h.work_order_service();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .create(Caller::user(7), request("Broken blinds"), vec![png("a.png")], cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::Cancelled));
    assert_eq!(h.count_rows("work_orders").await, 0);
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
async fn stored_references_are_never_signed_urls() {
    let h = harness().await;
    let service = h.work_order_service();
    let owner = Caller::user(7);

    let created = service
        .create(owner, request("Mould on ceiling"), vec![png("a.png"), png("b.png")], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(created.attachments.len(), 2);
    assert!(created.attachments.iter().all(|a| a.contains("signature=")));
    assert_eq!(h.blob_count(), 2);

    let read_twice = [
        service.get(owner, created.id).await.unwrap(),
        service.get(owner, created.id).await.unwrap(),
    ];
    assert!(read_twice.iter().all(|w| w.attachments.len() == 2));

    let (stored,): (String,) = sqlx::query_as("SELECT attachments FROM work_orders WHERE id = ?")
        .bind(created.id)
        .fetch_one(&h.pool.reader)
        .await
        .unwrap();
    let refs: Vec<String> = serde_json::from_str(&stored).unwrap();
    assert_eq!(refs.len(), 2);
    assert!(refs[0].starts_with(&format!("test/work-orders/{}/", created.id)));
    assert!(refs[0].ends_with("-0-a.png"));
    assert!(refs[1].ends_with("-1-b.png"));
    assert!(refs.iter().all(|r| !r.contains('?')));
}

#[tokio::test]
async fn update_appends_in_order_and_failure_keeps_existing() {
    let h = harness_with(FailingBlobs::wrap("broken.png")).await;
    let service = h.work_order_service();
    let owner = Caller::user(7);

    let created = service
        .create(owner, request("Loose railing"), vec![png("first.png")], CancellationToken::new())
        .await
        .unwrap();

    let updated = service
        .update(
            owner,
            created.id,
            WorkOrderPatch {
                status: Some(WorkOrderStatus::Scheduled),
                ..Default::default()
            },
            vec![png("second.png")],
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, WorkOrderStatus::Scheduled);
    assert_eq!(updated.attachments.len(), 2);
    assert!(updated.attachments[0].contains("first.png"));
    assert!(updated.attachments[1].contains("second.png"));

    let err = service
        .update(
            owner,
            created.id,
            WorkOrderPatch {
                status: Some(WorkOrderStatus::Completed),
                ..Default::default()
            },
            vec![png("third.png"), png("broken.png")],
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::Storage(_)));

    let current = service.get(owner, created.id).await.unwrap();
    assert_eq!(current.status, WorkOrderStatus::Scheduled);
    assert_eq!(current.attachments.len(), 2);
    assert_eq!(h.blob_count(), 2);
}

#[tokio::test]
async fn deleting_a_work_order_removes_every_blob_it_owned() {
    let h = harness().await;
    let work_orders = h.work_order_service();
    let estimates = h.estimate_service();
    let owner = Caller::user(7);

    let wo = work_orders
        .create(owner, request("Replace boiler"), vec![png("boiler.png")], CancellationToken::new())
        .await
        .unwrap();
    estimates
        .create(
            owner,
            NewEstimate {
                work_order_id: wo.id,
                vendor_id: 3,
                cost: 1450.0,
            },
            Some(png("quote.png")),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(h.blob_count(), 2);

    let err = work_orders.delete(Caller::user(8), wo.id).await.unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));

    work_orders.delete(owner, wo.id).await.unwrap();
    assert_eq!(h.count_rows("work_orders").await, 0);
    assert_eq!(h.count_rows("estimates").await, 0);
    assert_eq!(h.blob_count(), 0);
}

#[tokio::test]
async fn estimate_attachment_is_replaced_not_appended() {
    let h = harness().await;
    let work_orders = h.work_order_service();
    let estimates = h.estimate_service();
    let owner = Caller::user(7);

    let wo = work_orders
        .create(owner, request("Repaint hallway"), Vec::new(), CancellationToken::new())
        .await
        .unwrap();
    let estimate = estimates
        .create(
            owner,
            NewEstimate {
                work_order_id: wo.id,
                vendor_id: 3,
                cost: 300.0,
            },
            Some(png("quote-v1.png")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let updated = estimates
        .update(
            owner,
            estimate.id,
            EstimatePatch {
                cost: Some(275.5),
                ..Default::default()
            },
            Some(png("quote-v2.png")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(updated.cost, 275.5);
    assert!(updated.attachment.unwrap().contains("quote-v2.png"));
    assert_eq!(h.blob_count(), 1);
}
