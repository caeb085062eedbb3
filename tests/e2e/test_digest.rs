use crate::helpers::TestContext;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_generate_a_weekly_digest(ctx: &TestContext) {
    let account = ctx
        .fixtures
        .create_account_with(
            "digest@example.com",
            echopost_backend::domain::account::PlanTier::Free,
            false,
            true,
        )
        .await
        .unwrap();

    ctx.fixtures
        .create_issue("Alpha Weekly", "Alpha Issue", "<p>News about compilers.</p>")
        .await
        .unwrap();
    ctx.fixtures
        .create_issue("Beta Briefing", "Beta Issue", "<p>News about databases.</p>")
        .await
        .unwrap();

    ctx.synthesis
        .schedule_digest(account.id, "2026-W35")
        .await
        .unwrap();

    // The in-process worker picks the digest job up
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(20);
    let record = loop {
        let record: Option<(String, Option<Vec<u8>>, Option<i32>)> = sqlx::query_as(
            "SELECT status, audio_data, credits_charged FROM narrations WHERE account_id = $1 AND record_key = $2",
        )
        .bind(account.id)
        .bind("digest:2026-W35")
        .fetch_optional(&ctx.pool)
        .await
        .unwrap();

        if let Some(record) = &record {
            if record.0 == "ready" {
                break record.clone();
            }
            assert_ne!(record.0, "failed", "Digest generation failed");
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for digest, last: {:?}",
            record
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    };

    let audio = String::from_utf8(record.1.unwrap()).unwrap();
    assert!(audio.starts_with("[chunk-0]"));
    assert_eq!(record.2, Some(10));

    // Both issues made it into the spoken script, titles as section headings
    let script = ctx
        .speech
        .synthesized_texts()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    assert!(script.contains("Alpha Issue"));
    assert!(script.contains("Beta Issue"));
    assert!(script.contains("compilers"));
    assert!(script.contains("databases"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_duplicate_a_scheduled_digest(ctx: &TestContext) {
    let account = ctx
        .fixtures
        .create_account_with(
            "repeat-digest@example.com",
            echopost_backend::domain::account::PlanTier::Free,
            false,
            true,
        )
        .await
        .unwrap();

    ctx.fixtures
        .create_issue("Gamma Gazette", "Gamma Issue", "<p>News about networking.</p>")
        .await
        .unwrap();

    ctx.synthesis
        .schedule_digest(account.id, "2026-W36")
        .await
        .unwrap();
    ctx.synthesis
        .schedule_digest(account.id, "2026-W36")
        .await
        .unwrap();

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE job_type = 'digest.generate'")
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}
