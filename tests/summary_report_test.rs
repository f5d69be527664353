//! Tests for monthly summary generation, the summary lifecycle and the
//! reporting facade.

mod common;

use assert_matches::assert_matches;
use commission_api::{
    errors::ServiceError,
    models::{Month, SummaryStatus},
    services::summaries::SummaryFilter,
};
use common::TestContext;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn summary_totals_exclude_reversed_commissions() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let month = Month::current();

    ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await; // 100.00
    ctx.seed_commission(staff, branch, dec!(1500), dec!(10)).await; // 150.00
    let reversed = ctx.seed_commission(staff, branch, dec!(500), dec!(10)).await;
    ctx.services
        .commissions
        .reverse_commission(reversed.id, None, None)
        .await
        .unwrap();

    let summary = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();

    assert_eq!(summary.total_services, 2);
    assert_eq!(summary.total_commission, dec!(250.00));
    assert_eq!(summary.average_commission_per_service, dec!(125.00));
    assert_eq!(summary.status, SummaryStatus::Pending);
}

#[tokio::test]
async fn regeneration_is_deterministic_and_resets_to_pending() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let month = Month::current();

    ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await;

    let first = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();
    ctx.services
        .summaries
        .approve_summary(first.id, Some(Uuid::new_v4()))
        .await
        .unwrap();

    let second = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();

    // Same scope, same totals, same row; approval is withdrawn.
    assert_eq!(second.id, first.id);
    assert_eq!(second.total_commission, first.total_commission);
    assert_eq!(second.status, SummaryStatus::Pending);
    assert!(second.approved_at.is_none());
    assert!(second.version > first.version);
}

#[tokio::test]
async fn empty_scope_produces_zeroed_summary() {
    let ctx = TestContext::new().await;

    let summary = ctx
        .services
        .summaries
        .generate_summary(Uuid::new_v4(), Uuid::new_v4(), Month::current())
        .await
        .unwrap();

    assert_eq!(summary.total_services, 0);
    assert_eq!(summary.total_commission, Decimal::ZERO);
    assert_eq!(summary.average_commission_per_service, Decimal::ZERO);
}

#[tokio::test]
async fn locked_summary_cannot_be_regenerated() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let month = Month::current();

    ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await;
    let summary = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();
    ctx.services
        .summaries
        .approve_summary(summary.id, None)
        .await
        .unwrap();
    ctx.services.summaries.lock_summary(summary.id).await.unwrap();

    let err = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStateTransition(_));
}

#[tokio::test]
async fn summary_lifecycle_enforces_order() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();

    ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await;
    let summary = ctx
        .services
        .summaries
        .generate_summary(staff, branch, Month::current())
        .await
        .unwrap();

    // Locking straight from PENDING is refused.
    assert_matches!(
        ctx.services.summaries.lock_summary(summary.id).await,
        Err(ServiceError::InvalidStateTransition(_))
    );

    let approved = ctx
        .services
        .summaries
        .approve_summary(summary.id, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(approved.status, SummaryStatus::Approved);
    assert!(approved.approved_at.is_some());

    // Approving twice is refused.
    assert_matches!(
        ctx.services.summaries.approve_summary(summary.id, None).await,
        Err(ServiceError::InvalidStateTransition(_))
    );

    let locked = ctx.services.summaries.lock_summary(summary.id).await.unwrap();
    assert_eq!(locked.status, SummaryStatus::Locked);
    assert!(locked.locked_at.is_some());
}

#[tokio::test]
async fn concurrent_lock_and_regenerate_have_a_single_winner() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let month = Month::current();

    ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await; // 100.00
    let summary = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();
    ctx.services
        .summaries
        .approve_summary(summary.id, None)
        .await
        .unwrap();

    // New activity the regeneration would pick up, so the two outcomes are
    // distinguishable.
    ctx.seed_commission(staff, branch, dec!(2000), dec!(10)).await; // 200.00

    let (locked, regenerated) = tokio::join!(
        ctx.services.summaries.lock_summary(summary.id),
        ctx.services.summaries.generate_summary(staff, branch, month),
    );

    // Exactly one write lands; the other is refused, never silently
    // overwritten.
    let locked_won = locked.is_ok();
    assert!(locked_won != regenerated.is_ok());
    let loser = if locked_won {
        regenerated.unwrap_err()
    } else {
        locked.unwrap_err()
    };
    assert_matches!(
        loser,
        ServiceError::InvalidStateTransition(_) | ServiceError::ConcurrentModification(_)
    );

    let final_state = ctx.services.summaries.get_summary(summary.id).await.unwrap();
    if locked_won {
        // Lock won: totals frozen at the approved snapshot.
        assert_eq!(final_state.status, SummaryStatus::Locked);
        assert_eq!(final_state.total_commission, dec!(100.00));
        assert!(final_state.locked_at.is_some());
    } else {
        // Regeneration won: approval withdrawn, totals refreshed, no lock.
        assert_eq!(final_state.status, SummaryStatus::Pending);
        assert_eq!(final_state.total_commission, dec!(300.00));
        assert!(final_state.locked_at.is_none());
    }
}

#[tokio::test]
async fn reversal_invalidates_pending_summary() {
    let ctx = TestContext::new().await;
    let staff = Uuid::new_v4();
    let branch = Uuid::new_v4();
    let month = Month::current();

    let keep = ctx.seed_commission(staff, branch, dec!(1000), dec!(10)).await;
    let victim = ctx.seed_commission(staff, branch, dec!(2000), dec!(10)).await;

    ctx.services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();

    ctx.services
        .commissions
        .reverse_commission(victim.id, None, None)
        .await
        .unwrap();

    // The stale rollup is gone.
    let listed = ctx
        .services
        .summaries
        .list_summaries(
            SummaryFilter {
                staff_id: Some(staff),
                branch_id: Some(branch),
                month: Some(month),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(listed.total, 0);

    // Regeneration reflects only the surviving commission.
    let regenerated = ctx
        .services
        .summaries
        .generate_summary(staff, branch, month)
        .await
        .unwrap();
    assert_eq!(regenerated.total_services, 1);
    assert_eq!(regenerated.total_commission, keep.amount);
}

#[tokio::test]
async fn month_wide_generation_and_bulk_transitions() {
    let ctx = TestContext::new().await;
    let branch = Uuid::new_v4();
    let staff_a = Uuid::new_v4();
    let staff_b = Uuid::new_v4();
    let month = Month::current();

    ctx.seed_commission(staff_a, branch, dec!(1000), dec!(10)).await;
    ctx.seed_commission(staff_b, branch, dec!(2000), dec!(10)).await;

    let generated = ctx
        .services
        .summaries
        .generate_summaries_for_month(month)
        .await
        .unwrap();
    assert_eq!(generated.len(), 2);

    let approved = ctx
        .services
        .summaries
        .approve_all_for_month(month, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(approved, 2);

    // A fresh scope stays PENDING and must not be swept up by lock-month.
    let staff_c = Uuid::new_v4();
    ctx.seed_commission(staff_c, branch, dec!(500), dec!(10)).await;
    ctx.services
        .summaries
        .generate_summary(staff_c, branch, month)
        .await
        .unwrap();

    let locked = ctx.services.summaries.lock_all_for_month(month).await.unwrap();
    assert_eq!(locked, 2);

    let still_pending = ctx
        .services
        .summaries
        .list_summaries(
            SummaryFilter {
                status: Some(SummaryStatus::Pending),
                month: Some(month),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(still_pending.total, 1);
    assert_eq!(still_pending.summaries[0].staff_id, staff_c);
}

#[tokio::test]
async fn dashboard_reflects_ledger_state() {
    let ctx = TestContext::new().await;
    let branch = Uuid::new_v4();
    let staff_a = Uuid::new_v4();
    let staff_b = Uuid::new_v4();

    // 100.00 pending, 150.00 approved, 50.00 reversed.
    ctx.seed_commission(staff_a, branch, dec!(1000), dec!(10)).await;
    let approved = ctx.seed_commission(staff_b, branch, dec!(1500), dec!(10)).await;
    ctx.services
        .commissions
        .approve_commission(approved.id, None, None)
        .await
        .unwrap();
    let reversed = ctx.seed_commission(staff_a, branch, dec!(500), dec!(10)).await;
    ctx.services
        .commissions
        .reverse_commission(reversed.id, None, None)
        .await
        .unwrap();

    let dashboard = ctx.services.reports.dashboard().await.unwrap();
    assert_eq!(dashboard.total_commission, dec!(250.00));
    // Approval backlog covers PENDING and APPROVED rows alike.
    assert_eq!(dashboard.pending_approval_count, 2);
    assert_eq!(dashboard.approved_unpaid_total, dec!(150.00));

    assert_eq!(dashboard.top_staff.len(), 2);
    assert_eq!(dashboard.top_staff[0].staff_id, staff_b);
    assert_eq!(dashboard.top_staff[0].total_commission, dec!(150.00));

    assert_eq!(dashboard.branch_comparison.len(), 1);
    assert_eq!(dashboard.branch_comparison[0].branch_id, branch);
    assert_eq!(dashboard.branch_comparison[0].total_services, 2);
}

#[tokio::test]
async fn branch_and_staff_reports_group_their_dimension() {
    let ctx = TestContext::new().await;
    let month = Month::current();
    let branch_a = Uuid::new_v4();
    let branch_b = Uuid::new_v4();
    let staff = Uuid::new_v4();

    ctx.seed_commission(staff, branch_a, dec!(1000), dec!(10)).await;
    ctx.seed_commission(staff, branch_a, dec!(2000), dec!(10)).await;
    ctx.seed_commission(Uuid::new_v4(), branch_b, dec!(4000), dec!(10))
        .await;

    let by_branch = ctx.services.reports.branch_wise(month).await.unwrap();
    assert_eq!(by_branch.branches.len(), 2);
    assert_eq!(by_branch.branches[0].branch_id, branch_b);
    assert_eq!(by_branch.branches[0].total_commission, dec!(400.00));
    assert_eq!(by_branch.grand_total, dec!(700.00));

    let by_staff = ctx.services.reports.staff_wise(month).await.unwrap();
    assert_eq!(by_staff.staff.len(), 2);
    assert_eq!(by_staff.grand_total, dec!(700.00));
    let row = by_staff
        .staff
        .iter()
        .find(|r| r.staff_id == staff)
        .expect("staff row present");
    assert_eq!(row.total_services, 2);
    assert_eq!(row.average_commission, dec!(150.00));
}

#[tokio::test]
async fn trend_quarterly_and_year_end_cover_the_current_month() {
    let ctx = TestContext::new().await;
    let month = Month::current();
    ctx.seed_commission(Uuid::new_v4(), Uuid::new_v4(), dec!(1000), dec!(10))
        .await;

    // The trend is the twelve months of the requested year, January first.
    let trend = ctx.services.reports.monthly_trend(month.year()).await.unwrap();
    assert_eq!(trend.year, month.year());
    assert_eq!(trend.points.len(), 12);
    assert_eq!(trend.points[0].month.number(), 1);
    assert_eq!(trend.points[11].month.number(), 12);
    let current_point = trend
        .points
        .iter()
        .find(|p| p.month == month)
        .expect("current month present");
    assert_eq!(current_point.total_commission, dec!(100.00));

    // A different year reports that year, not a window ending today.
    let past = ctx
        .services
        .reports
        .monthly_trend(month.year() - 1)
        .await
        .unwrap();
    assert_eq!(past.year, month.year() - 1);
    assert_eq!(past.points.len(), 12);
    assert!(past.points.iter().all(|p| p.month.year() == month.year() - 1));
    assert!(past
        .points
        .iter()
        .all(|p| p.total_commission == Decimal::ZERO));

    let quarter = (month.number() - 1) / 3 + 1;
    let quarterly = ctx
        .services
        .reports
        .quarterly(month.year(), quarter)
        .await
        .unwrap();
    assert_eq!(quarterly.months.len(), 3);
    assert_eq!(quarterly.total_commission, dec!(100.00));
    assert_eq!(quarterly.total_services, 1);

    let year_end = ctx.services.reports.year_end(month.year()).await.unwrap();
    assert_eq!(year_end.months.len(), 12);
    assert_eq!(year_end.total_commission, dec!(100.00));
    assert_eq!(year_end.best_month, Some(month));

    // Out-of-range selectors are rejected.
    assert_matches!(
        ctx.services.reports.quarterly(month.year(), 5).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ctx.services.reports.monthly_trend(1999).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn empty_ledger_reports_are_zeroed() {
    let ctx = TestContext::new().await;

    let dashboard = ctx.services.reports.dashboard().await.unwrap();
    assert_eq!(dashboard.total_commission, Decimal::ZERO);
    assert_eq!(dashboard.pending_approval_count, 0);
    assert!(dashboard.top_staff.is_empty());
    assert!(dashboard.branch_comparison.is_empty());

    let by_branch = ctx
        .services
        .reports
        .branch_wise(Month::current())
        .await
        .unwrap();
    assert!(by_branch.branches.is_empty());
    assert_eq!(by_branch.grand_total, Decimal::ZERO);
}
