use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub sender: String,
    pub title: String,
    pub body_html: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct IssueRepository {
    pool: Arc<DbPool>,
}

impl IssueRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, issue_id: Uuid) -> AppResult<Option<Issue>> {
        let pool = self.pool.as_ref();
        let issue = sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE id = $1")
            .bind(issue_id)
            .fetch_optional(pool)
            .await?;

        Ok(issue)
    }

    pub async fn create(
        &self,
        sender: &str,
        title: &str,
        body_html: &str,
        published_at: DateTime<Utc>,
    ) -> AppResult<Issue> {
        let pool = self.pool.as_ref();
        let id = Uuid::new_v4();
        let now = Utc::now();

        let issue = sqlx::query_as::<_, Issue>(
            r#"
            INSERT INTO issues (id, sender, title, body_html, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(sender)
        .bind(title)
        .bind(body_html)
        .bind(published_at)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(issue)
    }

    /// Issues published since a given instant, oldest first (digest assembly order)
    pub async fn list_published_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Issue>> {
        let pool = self.pool.as_ref();
        let issues = sqlx::query_as::<_, Issue>(
            "SELECT * FROM issues WHERE published_at >= $1 ORDER BY published_at ASC",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(issues)
    }
}
