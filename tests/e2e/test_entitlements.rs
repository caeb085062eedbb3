use crate::helpers::DbTestContext;
use chrono::{Duration, Utc};
use echopost_backend::domain::entitlement::{EntitlementService, UNLIMITED_AVAILABLE};
use echopost_backend::infrastructure::repositories::{AccountRepository, EntitlementRepository};
use std::sync::Arc;
use test_context::test_context;

fn entitlement_service(ctx: &DbTestContext) -> EntitlementService {
    let pool = Arc::new(ctx.pool.clone());
    EntitlementService::new(
        Arc::new(AccountRepository::new(pool.clone())),
        Arc::new(EntitlementRepository::new(pool)),
    )
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_consume_tokens_up_to_the_tier_limit(ctx: &DbTestContext) {
    let account = ctx.fixtures.create_account("meter@example.com").await.unwrap();
    let service = entitlement_service(ctx);

    let check = service.ensure_available(account.id, 10).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.limit, 30);
    assert_eq!(check.available, 30);
    assert_eq!(check.tier, "free");

    let check = service.consume_atomic(account.id, 10).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.available, 20);

    // 4 more than the remaining 20
    let check = service.consume_atomic(account.id, 24).await.unwrap();
    assert!(!check.allowed);
    assert_eq!(check.available, 20);
    assert!(check.reason.as_deref().unwrap().contains("Insufficient tokens"));
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_not_overspend_under_concurrency(ctx: &DbTestContext) {
    let account = ctx.fixtures.create_account("race@example.com").await.unwrap();
    ctx.fixtures.set_tokens_used(account.id, 15).await.unwrap();
    let service = Arc::new(entitlement_service(ctx));

    // 15 tokens left on the free tier; two concurrent spends of 10 must not
    // both succeed
    let (a, b) = tokio::join!(
        service.consume_atomic(account.id, 10),
        service.consume_atomic(account.id, 10),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert!(a.allowed != b.allowed, "Exactly one spend should win: {:?} {:?}", a, b);

    // The loser reports the balance after the winner's spend, not before it
    let loser = if a.allowed { &b } else { &a };
    assert_eq!(loser.available, 5);

    let (tokens_used,): (i32,) =
        sqlx::query_as("SELECT tokens_used FROM entitlements WHERE account_id = $1")
            .bind(account.id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(tokens_used, 25);
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_give_pro_accounts_the_larger_budget(ctx: &DbTestContext) {
    let account = ctx.fixtures.create_pro_account("pro@example.com").await.unwrap();
    let service = entitlement_service(ctx);

    let check = service.ensure_available(account.id, 200).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.limit, 300);
    assert_eq!(check.tier, "pro");
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_bypass_the_ledger_for_unlimited_accounts(ctx: &DbTestContext) {
    let account = ctx
        .fixtures
        .create_unlimited_account("vip@example.com")
        .await
        .unwrap();
    let service = entitlement_service(ctx);

    let check = service.consume_atomic(account.id, 10_000).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.available, UNLIMITED_AVAILABLE);
    assert_eq!(check.limit, UNLIMITED_AVAILABLE);

    let (tokens_used,): (i32,) =
        sqlx::query_as("SELECT tokens_used FROM entitlements WHERE account_id = $1")
            .bind(account.id)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(tokens_used, 0);
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_roll_the_cycle_after_thirty_days(ctx: &DbTestContext) {
    let account = ctx.fixtures.create_account("cycled@example.com").await.unwrap();
    ctx.fixtures.set_tokens_used(account.id, 30).await.unwrap();
    ctx.fixtures
        .set_cycle_started_at(account.id, Utc::now() - Duration::days(31))
        .await
        .unwrap();
    let service = entitlement_service(ctx);

    // The stale cycle resets on access; the full budget is back
    let check = service.ensure_available(account.id, 10).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.available, 30);
    assert!(check.reset_at > Utc::now() + Duration::days(29));
}

#[test_context(DbTestContext)]
#[tokio::test]
async fn it_should_not_roll_a_cycle_still_in_progress(ctx: &DbTestContext) {
    let account = ctx.fixtures.create_account("midcycle@example.com").await.unwrap();
    ctx.fixtures.set_tokens_used(account.id, 12).await.unwrap();
    ctx.fixtures
        .set_cycle_started_at(account.id, Utc::now() - Duration::days(29))
        .await
        .unwrap();
    let service = entitlement_service(ctx);

    let check = service.ensure_available(account.id, 10).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.available, 18);
}
