//! Procurement request lifecycle

mod common;

use common::*;
use rust_decimal_macros::dec;
use sitestock_server::{
    models::{
        enums::{RequestType, Urgency},
        request::{CreateRequest, RequestQuery},
        status::{Action, RequestStatus},
    },
    AppError,
};
use tokio_test::{assert_err, assert_ok};

fn cement_request(submit: bool) -> CreateRequest {
    CreateRequest {
        request_type: RequestType::Material,
        project_id: 21,
        description: "Portland cement for ground floor slab".to_string(),
        quantity: Some(120),
        unit: Some("bags".to_string()),
        urgency: Some(Urgency::Urgent),
        date_needed: None,
        estimated_cost: Some(dec!(1250.50)),
        submit,
    }
}

#[tokio::test]
async fn test_request_full_chain() {
    let h = Harness::new();
    let svc = &h.services.requests;

    let draft = assert_ok!(svc.create(&clerk(), cement_request(false)).await);
    assert_eq!(draft.status, RequestStatus::Draft);
    assert!(draft.reference.starts_with("REQ-"));
    assert_eq!(draft.estimated_cost, Some(dec!(1250.50)));
    assert!(draft.signoffs.get(Action::Submit).is_none());

    let submitted = assert_ok!(svc.submit(&clerk(), draft.id).await);
    assert_eq!(submitted.status, RequestStatus::Submitted);
    assert_ok!(svc.verify(&project_manager(), draft.id).await);
    assert_ok!(svc.approve(&finance_director(), draft.id).await);
    assert_ok!(svc.procure(&procurement_officer(), draft.id).await);
    let fulfilled = assert_ok!(svc.fulfill(&warehouseman(), draft.id).await);

    assert_eq!(fulfilled.status, RequestStatus::Fulfilled);
    assert_eq!(
        fulfilled.signoffs.get(Action::Approve).unwrap().by,
        finance_director().user_id
    );
    assert_eq!(
        fulfilled.signoffs.get(Action::Procure).unwrap().by,
        procurement_officer().user_id
    );

    let entries = assert_ok!(h.services.activity.for_record("requests", draft.id).await);
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        [
            "request_created",
            "request_submitted",
            "request_verified",
            "request_approved",
            "request_procured",
            "request_fulfilled",
        ]
    );
}

#[tokio::test]
async fn test_request_created_submitted() {
    let h = Harness::new();
    let request = assert_ok!(h.services.requests.create(&clerk(), cement_request(true)).await);
    assert_eq!(request.status, RequestStatus::Submitted);
    assert_eq!(
        request.signoffs.get(Action::Submit).unwrap().by,
        clerk().user_id
    );
}

#[tokio::test]
async fn test_decline_keeps_reason() {
    let h = Harness::new();
    let svc = &h.services.requests;
    let request = assert_ok!(svc.create(&clerk(), cement_request(true)).await);

    let err = assert_err!(svc.decline(&project_manager(), request.id, " ".to_string()).await);
    assert!(matches!(err, AppError::Validation(_)));

    let declined = assert_ok!(
        svc.decline(
            &project_manager(),
            request.id,
            "Use stock from site B".to_string()
        )
        .await
    );
    assert_eq!(declined.status, RequestStatus::Declined);
    assert_eq!(declined.remarks.as_deref(), Some("Use stock from site B"));

    let err = assert_err!(svc.verify(&project_manager(), request.id).await);
    assert!(matches!(err, AppError::InvalidStatus { .. }));
}

#[tokio::test]
async fn test_request_roles_and_order() {
    let h = Harness::new();
    let svc = &h.services.requests;
    let request = assert_ok!(svc.create(&project_manager(), cement_request(true)).await);

    // The maker cannot verify their own request
    let err = assert_err!(svc.verify(&project_manager(), request.id).await);
    assert!(matches!(err, AppError::PermissionDenied(_)));

    // Only finance approves requests
    let err = assert_err!(svc.approve(&asset_director(), request.id).await);
    assert!(matches!(err, AppError::PermissionDenied(_)));

    // Procurement before approval
    let err = assert_err!(svc.procure(&procurement_officer(), request.id).await);
    assert!(matches!(err, AppError::InvalidStatus { .. }));

    let unchanged = assert_ok!(svc.get(request.id).await);
    assert_eq!(unchanged.status, RequestStatus::Submitted);

    let err = assert_err!(svc.get(9_999).await);
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_only_before_verification() {
    let h = Harness::new();
    let svc = &h.services.requests;

    let draft = assert_ok!(svc.create(&clerk(), cement_request(false)).await);
    let canceled = assert_ok!(svc.cancel(&clerk(), draft.id, None).await);
    assert_eq!(canceled.status, RequestStatus::Canceled);

    let verified = assert_ok!(svc.create(&clerk(), cement_request(true)).await);
    assert_ok!(svc.verify(&project_manager(), verified.id).await);
    let err = assert_err!(
        svc.cancel(&clerk(), verified.id, Some("Budget cut".to_string()))
            .await
    );
    assert!(matches!(err, AppError::InvalidStatus { .. }));
}

#[tokio::test]
async fn test_request_listing() {
    let h = Harness::new();
    let svc = &h.services.requests;

    let draft = assert_ok!(svc.create(&clerk(), cement_request(false)).await);
    let submitted = assert_ok!(svc.create(&clerk(), cement_request(true)).await);
    let mut other_project = cement_request(true);
    other_project.project_id = 22;
    other_project.request_type = RequestType::Equipment;
    let other = assert_ok!(svc.create(&clerk(), other_project).await);

    let all = assert_ok!(svc.list(&RequestQuery::default()).await);
    let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![other.id, submitted.id, draft.id]);

    let submitted_only = assert_ok!(
        svc.list(&RequestQuery {
            status: Some(RequestStatus::Submitted),
            project_id: Some(21),
            ..Default::default()
        })
        .await
    );
    assert_eq!(submitted_only.len(), 1);
    assert_eq!(submitted_only[0].id, submitted.id);
}

#[tokio::test]
async fn test_invalid_request_payload() {
    let h = Harness::new();
    let mut bad = cement_request(false);
    bad.description = "x".to_string();
    let err = assert_err!(h.services.requests.create(&clerk(), bad).await);
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        h.services
            .requests
            .create(&finance_director(), cement_request(false))
            .await
    );
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_drafts_belong_to_their_maker() {
    let h = Harness::new();
    let svc = &h.services.requests;
    let draft = assert_ok!(svc.create(&clerk(), cement_request(false)).await);

    let err = assert_err!(svc.submit(&warehouseman(), draft.id).await);
    assert!(matches!(err, AppError::PermissionDenied(_)));
    let err = assert_err!(svc.cancel(&warehouseman(), draft.id, None).await);
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let unchanged = assert_ok!(svc.get(draft.id).await);
    assert_eq!(unchanged.status, RequestStatus::Draft);
    assert_ok!(svc.submit(&clerk(), draft.id).await);
}

#[tokio::test]
async fn test_request_page_far_past_the_end() {
    let h = Harness::new();
    let svc = &h.services.requests;
    assert_ok!(svc.create(&clerk(), cement_request(true)).await);

    let far = assert_ok!(
        svc.list(&RequestQuery {
            page: Some(i64::MAX),
            per_page: Some(100),
            ..Default::default()
        })
        .await
    );
    assert!(far.is_empty());
}
