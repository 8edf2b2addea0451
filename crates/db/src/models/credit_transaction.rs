//! Credit ledger rows and the outcomes of balance-changing transactions.

use onlyvalid_core::error::CoreError;
use onlyvalid_core::promo::PromoRejection;
use onlyvalid_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `credit_transactions` ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CreditTransaction {
    pub id: DbId,
    pub user_id: DbId,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub job_id: Option<String>,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for `POST /api/v1/users/{id}/promo-redemptions`.
#[derive(Debug, Deserialize)]
pub struct RedeemPromo {
    pub code: String,
}

/// DTO for `POST /api/v1/admin/users/{id}/credits`.
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustCredits {
    pub amount: i64,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// New balance plus the ledger row that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceChange {
    pub balance: i64,
    pub transaction: CreditTransaction,
}

/// Result of [`CreditRepo::redeem_promo`](crate::repositories::CreditRepo::redeem_promo).
#[derive(Debug)]
pub enum RedemptionOutcome {
    Redeemed(BalanceChange),
    UnknownCode,
    UnknownUser,
    Rejected(PromoRejection),
}

/// Result of [`CreditRepo::adjust`](crate::repositories::CreditRepo::adjust).
#[derive(Debug)]
pub enum AdjustOutcome {
    Adjusted(BalanceChange),
    UnknownUser,
    /// Refused by [`apply_adjustment`](onlyvalid_core::credits::apply_adjustment).
    Rejected(CoreError),
}
