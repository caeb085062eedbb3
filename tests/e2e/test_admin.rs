use crate::helpers::fixtures::TEST_ADMIN_TOKEN;
use crate::helpers::TestContext;
use hyper::StatusCode;
use serde_json::json;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_admin_requests_without_the_token(ctx: &TestContext) {
    let response = ctx.client.get("/admin/jobs/stats").await.unwrap();
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = ctx
        .client
        .get_with_auth("/admin/jobs/stats", "wrong-token")
        .await
        .unwrap();
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_queue_stats_per_job_type(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_auth("/admin/jobs/stats", TEST_ADMIN_TOKEN)
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    let body = response.body.as_ref().unwrap();
    for job_type in ["audio.requested", "digest.generate"] {
        let per_status = body.get(job_type).unwrap();
        for status in ["queued", "processing", "completed", "failed", "dead_letter"] {
            assert!(
                per_status.get(status).and_then(|v| v.as_i64()).is_some(),
                "Missing {}/{} in {:?}",
                job_type,
                status,
                body
            );
        }
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_require_a_reason_to_replay(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_auth(
            "/admin/jobs/audio.requested/replay",
            &json!({"reason": "   "}),
            TEST_ADMIN_TOKEN,
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = ctx
        .client
        .post_with_auth(
            "/admin/jobs/notion.sync/replay",
            &json!({"reason": "retry"}),
            TEST_ADMIN_TOKEN,
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_replay_nothing_when_the_dead_letter_queue_is_empty(ctx: &TestContext) {
    let response = ctx
        .client
        .post_with_auth(
            "/admin/jobs/audio.requested/replay",
            &json!({"reason": "smoke test"}),
            TEST_ADMIN_TOKEN,
        )
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json_i64("/replayed"), 0);
    assert_eq!(response.json_str("/job_type"), "audio.requested");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_summarize_synthesis_metrics(ctx: &TestContext) {
    let account = ctx.fixtures.create_account("metrics@example.com").await.unwrap();
    let token = ctx.fixtures.auth_token(&account);
    let issue = ctx
        .fixtures
        .create_issue("Sender", "Measured Issue", "<p>Synthesis worth measuring.</p>")
        .await
        .unwrap();

    ctx.client
        .post_with_auth(
            &format!("/api/audio/issues/{}", issue.id),
            &json!({}),
            &token,
        )
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);
    ctx.wait_for_status(&token, issue.id, "ready").await;

    let response = ctx
        .client
        .get_with_auth("/admin/metrics/summary?window_minutes=5", TEST_ADMIN_TOKEN)
        .await
        .unwrap();
    response.assert_status(StatusCode::OK);

    assert_eq!(response.json_i64("/window_minutes"), 5);
    assert_eq!(response.json_i64("/success_count"), 1);
    assert_eq!(response.json_i64("/cache_misses"), 1);
    assert_eq!(response.json_i64("/cache_hits"), 0);
    assert!(response.json_i64("/latency_p50_ms") >= 0);
    assert!(response.json_i64("/latency_p95_ms") >= response.json_i64("/latency_p50_ms"));
}
