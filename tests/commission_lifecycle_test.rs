//! End-to-end tests for the commission ledger lifecycle:
//! creation, approval, adjustment, locking and reversal.

mod common;

use assert_matches::assert_matches;
use commission_api::{
    errors::ServiceError,
    models::{AdjustmentType, CommissionStatus, CommissionType},
    services::commissions::{AdjustCommissionRequest, CreateCommissionRequest},
};
use common::TestContext;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn adjust_request(new_amount: rust_decimal::Decimal, kind: AdjustmentType) -> AdjustCommissionRequest {
    AdjustCommissionRequest {
        new_amount,
        reason: "quality bonus for repeat client".to_string(),
        adjustment_type: kind,
        applied_by: Uuid::new_v4(),
        version: None,
    }
}

#[tokio::test]
async fn percentage_commission_full_lifecycle() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();

    // A completed 1000.00 service at 10% opens a 100.00 commission.
    let commission = ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await;
    assert_eq!(commission.amount, dec!(100.00));
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.version, 1);
    assert!(!commission.is_manual);

    let approved = ctx
        .services
        .commissions
        .approve_commission(commission.id, Some(Uuid::new_v4()), None)
        .await
        .unwrap();
    assert_eq!(approved.status, CommissionStatus::Approved);
    assert!(approved.approved_at.is_some());
    assert!(approved.approved_by.is_some());
    assert_eq!(approved.version, 2);

    // Manager bonus raises the amount; approval state is untouched.
    let adjusted = ctx
        .services
        .commissions
        .adjust_commission(commission.id, adjust_request(dec!(120), AdjustmentType::Bonus))
        .await
        .unwrap();
    assert_eq!(adjusted.amount, dec!(120));
    assert_eq!(adjusted.status, CommissionStatus::Approved);
    assert!(adjusted.is_manual);

    let trail = ctx
        .services
        .commissions
        .adjustment_history(commission.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].sequence, 1);
    assert_eq!(trail[0].previous_amount, dec!(100.00));
    assert_eq!(trail[0].new_amount, dec!(120));
    assert_eq!(trail[0].adjustment_type, AdjustmentType::Bonus);

    let locked = ctx
        .services
        .commissions
        .lock_commission(commission.id, None)
        .await
        .unwrap();
    assert_eq!(locked.status, CommissionStatus::Locked);
    assert!(locked.locked_at.is_some());

    // Locked commissions are frozen for payroll.
    let err = ctx
        .services
        .commissions
        .adjust_commission(commission.id, adjust_request(dec!(130), AdjustmentType::Correction))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AdjustmentRejected(_));
}

#[tokio::test]
async fn fixed_amount_commission_ignores_base() {
    let ctx = TestContext::new().await;

    let commission = ctx
        .services
        .commissions
        .create_commission(CreateCommissionRequest {
            staff_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            base_amount: dec!(999),
            rate: dec!(25),
            commission_type: CommissionType::FixedAmount,
        })
        .await
        .unwrap();

    assert_eq!(commission.amount, dec!(25.00));
}

#[tokio::test]
async fn reversing_a_locked_commission_is_refused_and_state_unchanged() {
    let ctx = TestContext::new().await;
    let commission = ctx
        .seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(500), dec!(20))
        .await;

    ctx.services
        .commissions
        .approve_commission(commission.id, None, None)
        .await
        .unwrap();
    ctx.services
        .commissions
        .lock_commission(commission.id, None)
        .await
        .unwrap();

    let err = ctx
        .services
        .commissions
        .reverse_commission(commission.id, Some("billing dispute".into()), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));

    let current = ctx
        .services
        .commissions
        .get_commission(commission.id)
        .await
        .unwrap();
    assert_eq!(current.status, CommissionStatus::Locked);
    assert!(current.reversed_at.is_none());
}

#[tokio::test]
async fn reversal_is_terminal() {
    let ctx = TestContext::new().await;
    let commission = ctx
        .seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(300), dec!(10))
        .await;

    let reversed = ctx
        .services
        .commissions
        .reverse_commission(commission.id, None, None)
        .await
        .unwrap();
    assert_eq!(reversed.status, CommissionStatus::Reversed);
    assert!(reversed.reversed_at.is_some());

    let err = ctx
        .services
        .commissions
        .approve_commission(commission.id, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
}

#[tokio::test]
async fn concurrent_double_approve_yields_exactly_one_success() {
    let ctx = TestContext::new().await;
    let commission = ctx
        .seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(800), dec!(15))
        .await;

    let first = ctx
        .services
        .commissions
        .approve_commission(commission.id, None, None);
    let second = ctx
        .services
        .commissions
        .approve_commission(commission.id, None, None);
    let (a, b) = tokio::join!(first, second);

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert_matches!(failure, ServiceError::InvalidStateTransition(_));
}

#[tokio::test]
async fn stale_version_is_rejected_as_concurrent_modification() {
    let ctx = TestContext::new().await;
    let commission = ctx
        .seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(400), dec!(10))
        .await;

    // Another actor bumps the version first.
    ctx.services
        .commissions
        .approve_commission(commission.id, None, Some(1))
        .await
        .unwrap();

    let err = ctx
        .services
        .commissions
        .lock_commission(commission.id, Some(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConcurrentModification(id) if id == commission.id);

    // The current version still works.
    let locked = ctx
        .services
        .commissions
        .lock_commission(commission.id, Some(2))
        .await
        .unwrap();
    assert_eq!(locked.status, CommissionStatus::Locked);
}

#[tokio::test]
async fn adjustment_trail_replays_to_current_amount() {
    let ctx = TestContext::new().await;
    let commission = ctx
        .seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(1000), dec!(10))
        .await;

    for (amount, kind) in [
        (dec!(110), AdjustmentType::Bonus),
        (dec!(95), AdjustmentType::Correction),
        (dec!(105), AdjustmentType::ManualAdjustment),
    ] {
        ctx.services
            .commissions
            .adjust_commission(commission.id, adjust_request(amount, kind))
            .await
            .unwrap();
    }

    let trail = ctx
        .services
        .commissions
        .adjustment_history(commission.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(
        trail.iter().map(|a| a.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    // Each entry chains from the previous one.
    assert_eq!(trail[0].previous_amount, dec!(100.00));
    for pair in trail.windows(2) {
        assert_eq!(pair[0].new_amount, pair[1].previous_amount);
    }

    let current = ctx
        .services
        .commissions
        .get_commission(commission.id)
        .await
        .unwrap();
    assert_eq!(current.amount, trail.last().unwrap().new_amount);
}

#[tokio::test]
async fn unknown_commission_is_not_found() {
    let ctx = TestContext::new().await;
    let missing = Uuid::new_v4();

    assert_matches!(
        ctx.services.commissions.get_commission(missing).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        ctx.services.commissions.adjustment_history(missing).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        ctx.services
            .commissions
            .approve_commission(missing, None, None)
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn listing_filters_by_status_and_scope() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();

    let first = ctx.seed_commission(staff, branch, dec!(100), dec!(10)).await;
    ctx.seed_commission(staff, branch, dec!(200), dec!(10)).await;
    ctx.seed_commission(Uuid::new_v4(), branch, dec!(300), dec!(10))
        .await;

    ctx.services
        .commissions
        .approve_commission(first.id, None, None)
        .await
        .unwrap();

    let by_staff = ctx
        .services
        .commissions
        .list_commissions(
            commission_api::services::commissions::CommissionFilter {
                staff_id: Some(staff),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(by_staff.total, 2);

    let approved_only = ctx
        .services
        .commissions
        .list_commissions(
            commission_api::services::commissions::CommissionFilter {
                status: Some(CommissionStatus::Approved),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(approved_only.total, 1);
    assert_eq!(approved_only.commissions[0].id, first.id);
}
