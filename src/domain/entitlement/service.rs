use crate::domain::account::PlanTier;
use crate::domain::jobs::NarrationMode;
use crate::error::{AppError, AppResult};
use crate::infrastructure::repositories::{AccountRepository, EntitlementRepository};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Sentinel for "unbounded" balances on unlimited accounts
pub const UNLIMITED_AVAILABLE: i32 = -1;

/// Token prices per action. The ledger itself is action-agnostic; callers pass
/// the precomputed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCost(pub i32);

impl TokenCost {
    pub fn for_mode(mode: NarrationMode) -> Self {
        match mode {
            NarrationMode::Full => TokenCost(10),
            NarrationMode::Condensed => TokenCost(4),
            NarrationMode::Digest => TokenCost(10),
        }
    }
}

/// Outcome of a balance check or consumption attempt
#[derive(Debug, Clone, Serialize)]
pub struct UsageCheck {
    pub allowed: bool,
    pub available: i32,
    pub limit: i32,
    pub tier: String,
    pub reset_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct EntitlementService {
    account_repo: Arc<AccountRepository>,
    entitlement_repo: Arc<EntitlementRepository>,
}

impl EntitlementService {
    pub fn new(
        account_repo: Arc<AccountRepository>,
        entitlement_repo: Arc<EntitlementRepository>,
    ) -> Self {
        Self {
            account_repo,
            entitlement_repo,
        }
    }

    /// Read-only balance check. Rolls the 30-day cycle first when expired.
    pub async fn ensure_available(
        &self,
        account_id: Uuid,
        tokens_needed: i32,
    ) -> AppResult<UsageCheck> {
        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

        if account.unlimited_override {
            return Ok(unlimited_check(account.plan_tier));
        }

        let record = self.entitlement_repo.find_or_roll(account_id).await?;
        let limit = account.plan_tier.cycle_token_limit();
        let available = (limit - record.tokens_used).max(0);
        let allowed = available >= tokens_needed;

        Ok(UsageCheck {
            allowed,
            available,
            limit,
            tier: account.plan_tier.to_string(),
            reset_at: record.cycle_started_at + Duration::days(30),
            reason: if allowed {
                None
            } else {
                Some(format!(
                    "Insufficient tokens: {} available, {} needed",
                    available, tokens_needed
                ))
            },
        })
    }

    /// Check-and-increment in one database-side atomic statement. Two
    /// concurrent consumers of the same account cannot jointly overspend.
    pub async fn consume_atomic(&self, account_id: Uuid, tokens: i32) -> AppResult<UsageCheck> {
        let account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

        // Unlimited accounts bypass the ledger and are never charged
        if account.unlimited_override {
            return Ok(unlimited_check(account.plan_tier));
        }

        let record = self.entitlement_repo.find_or_roll(account_id).await?;
        let limit = account.plan_tier.cycle_token_limit();
        let reset_at = record.cycle_started_at + Duration::days(30);

        match self
            .entitlement_repo
            .try_consume(account_id, tokens, limit)
            .await?
        {
            Some(tokens_used) => {
                tracing::info!(
                    account_id = %account_id,
                    tokens = tokens,
                    tokens_used = tokens_used,
                    limit = limit,
                    "Entitlement tokens consumed"
                );
                Ok(UsageCheck {
                    allowed: true,
                    available: (limit - tokens_used).max(0),
                    limit,
                    tier: account.plan_tier.to_string(),
                    reset_at,
                    reason: None,
                })
            }
            None => {
                // Re-read so a lost race reports the winner's balance
                let current = self.entitlement_repo.find_or_roll(account_id).await?;
                let available = (limit - current.tokens_used).max(0);
                Ok(UsageCheck {
                    allowed: false,
                    available,
                    limit,
                    tier: account.plan_tier.to_string(),
                    reset_at,
                    reason: Some(format!(
                        "Insufficient tokens: {} available, {} needed",
                        available, tokens
                    )),
                })
            }
        }
    }
}

fn unlimited_check(tier: PlanTier) -> UsageCheck {
    UsageCheck {
        allowed: true,
        available: UNLIMITED_AVAILABLE,
        limit: UNLIMITED_AVAILABLE,
        tier: tier.to_string(),
        reset_at: Utc::now() + Duration::days(30),
        reason: None,
    }
}
