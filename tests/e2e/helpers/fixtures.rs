use anyhow::Result;
use chrono::{DateTime, Utc};
use echopost_backend::domain::account::{Account, PlanTier};
use echopost_backend::infrastructure::auth::JwtManager;
use echopost_backend::infrastructure::repositories::Issue;
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-key-for-testing-only";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestFixtures {
    pool: PgPool,
}

impl TestFixtures {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_account(&self, email: &str) -> Result<Account> {
        self.create_account_with(email, PlanTier::Free, false, false)
            .await
    }

    pub async fn create_pro_account(&self, email: &str) -> Result<Account> {
        self.create_account_with(email, PlanTier::Pro, false, false)
            .await
    }

    pub async fn create_unlimited_account(&self, email: &str) -> Result<Account> {
        self.create_account_with(email, PlanTier::Pro, true, false)
            .await
    }

    pub async fn create_account_with(
        &self,
        email: &str,
        tier: PlanTier,
        unlimited_override: bool,
        digest_enabled: bool,
    ) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            plan_tier: tier,
            unlimited_override,
            digest_enabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, plan_tier, unlimited_override, digest_enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(account.plan_tier)
        .bind(account.unlimited_override)
        .bind(account.digest_enabled)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO entitlements (account_id, tokens_used, cycle_started_at, updated_at)
            VALUES ($1, 0, $2, $2)
            "#,
        )
        .bind(account.id)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    /// Pre-spend tokens in the current cycle
    pub async fn set_tokens_used(&self, account_id: Uuid, tokens_used: i32) -> Result<()> {
        sqlx::query("UPDATE entitlements SET tokens_used = $2, updated_at = $3 WHERE account_id = $1")
            .bind(account_id)
            .bind(tokens_used)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Backdate the cycle start so the next ledger access rolls it over
    pub async fn set_cycle_started_at(
        &self,
        account_id: Uuid,
        cycle_started_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE entitlements SET cycle_started_at = $2, updated_at = $3 WHERE account_id = $1",
        )
        .bind(account_id)
        .bind(cycle_started_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create_issue(&self, sender: &str, title: &str, body_html: &str) -> Result<Issue> {
        let issue = Issue {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            title: title.to_string(),
            body_html: body_html.to_string(),
            published_at: Utc::now(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO issues (id, sender, title, body_html, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(issue.id)
        .bind(&issue.sender)
        .bind(&issue.title)
        .bind(&issue.body_html)
        .bind(issue.published_at)
        .bind(issue.created_at)
        .execute(&self.pool)
        .await?;

        Ok(issue)
    }

    pub fn auth_token(&self, account: &Account) -> String {
        JwtManager::new(TEST_JWT_SECRET.to_string(), 1)
            .generate_token(account.id, &account.email)
            .expect("Failed to generate test token")
    }
}

/// Sample newsletter body with enough structure to exercise the script engine
pub fn sample_issue_html() -> &'static str {
    r#"
    <html>
      <body>
        <h1>This Week in Distributed Systems</h1>
        <p>Welcome back, readers. This week we look at consensus protocols
        and why leader election keeps going wrong in production.</p>
        <p>Check out <a href="https://example.com/paper">the full paper</a>
        for the gritty details.</p>
        <p>Subscribe now to get this newsletter every week!</p>
        <p>Cheers,<br/>The Editors</p>
      </body>
    </html>
    "#
}
