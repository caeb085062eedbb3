use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub plan_tier: PlanTier,
    pub unlimited_override: bool,
    pub digest_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
pub enum PlanTier {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "pro")]
    Pro,
}

impl PlanTier {
    /// Token budget per 30-day entitlement cycle
    pub fn cycle_token_limit(&self) -> i32 {
        match self {
            PlanTier::Free => 30,
            PlanTier::Pro => 300,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Free => write!(f, "free"),
            PlanTier::Pro => write!(f, "pro"),
        }
    }
}
