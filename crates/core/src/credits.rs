//! Credit billing rules.
//!
//! One credit is consumed per address submitted for verification. Credits
//! are charged up front when a job is created; when a job fails, the share
//! for addresses the engine never processed is refunded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Credits charged per submitted email address.
pub const CREDITS_PER_EMAIL: i64 = 1;

/// Upper bound on the number of addresses in one job.
pub const MAX_EMAILS_PER_JOB: i64 = 1_000_000;

/// Kind of a row in the `credit_transactions` ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    PromoRedemption,
    VerificationDebit,
    AdminAdjustment,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::PromoRedemption => "promo_redemption",
            TransactionKind::VerificationDebit => "verification_debit",
            TransactionKind::AdminAdjustment => "admin_adjustment",
            TransactionKind::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promo_redemption" => Ok(TransactionKind::PromoRedemption),
            "verification_debit" => Ok(TransactionKind::VerificationDebit),
            "admin_adjustment" => Ok(TransactionKind::AdminAdjustment),
            "refund" => Ok(TransactionKind::Refund),
            other => Err(CoreError::Validation(format!(
                "Unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// Credits needed to verify `total_emails` addresses.
pub fn credits_required(total_emails: i64) -> Result<i64, CoreError> {
    if total_emails <= 0 {
        return Err(CoreError::Validation(
            "total_emails must be greater than zero".into(),
        ));
    }
    if total_emails > MAX_EMAILS_PER_JOB {
        return Err(CoreError::Validation(format!(
            "total_emails must not exceed {MAX_EMAILS_PER_JOB}"
        )));
    }
    Ok(total_emails * CREDITS_PER_EMAIL)
}

/// Credits to return when a job fails after `processed` addresses.
///
/// Never negative and never more than was charged.
pub fn refund_for_failure(credits_charged: i64, processed: i64) -> i64 {
    let consumed = processed.max(0).saturating_mul(CREDITS_PER_EMAIL);
    (credits_charged - consumed).clamp(0, credits_charged.max(0))
}

/// Apply a signed admin adjustment to a balance.
///
/// Zero adjustments are rejected; the result may not be negative.
pub fn apply_adjustment(balance: i64, amount: i64) -> Result<i64, CoreError> {
    if amount == 0 {
        return Err(CoreError::Validation("amount must not be zero".into()));
    }
    let next = balance
        .checked_add(amount)
        .ok_or_else(|| CoreError::Validation("amount out of range".into()))?;
    if next < 0 {
        return Err(CoreError::InsufficientCredits {
            required: -amount,
            available: balance,
        });
    }
    Ok(next)
}
