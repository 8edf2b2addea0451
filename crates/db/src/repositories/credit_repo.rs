//! Repository for credit balances and the `credit_transactions` ledger.
//!
//! Every balance change locks the user row (`FOR UPDATE`), writes the new
//! balance and appends exactly one ledger row inside the same transaction.

use chrono::Utc;
use onlyvalid_core::credits::{apply_adjustment, TransactionKind};
use onlyvalid_core::promo::PromoRejection;
use onlyvalid_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::credit_transaction::{
    AdjustOutcome, BalanceChange, CreditTransaction, RedemptionOutcome,
};
use crate::models::promo_code::PromoCode;

const LEDGER_COLUMNS: &str = "id, user_id, kind, amount, balance_after, job_id, note, created_at";

/// A ledger row about to be written.
pub(crate) struct LedgerEntry<'a> {
    pub user_id: DbId,
    pub kind: TransactionKind,
    pub amount: i64,
    pub job_id: Option<&'a str>,
    pub note: Option<&'a str>,
}

pub struct CreditRepo;

impl CreditRepo {
    /// Redeem `code` for `user_id` in one transaction.
    ///
    /// Locks the promo row so concurrent redemptions of a limited code
    /// serialize on `redemption_count`.
    pub async fn redeem_promo(
        pool: &PgPool,
        user_id: DbId,
        code: &str,
    ) -> Result<RedemptionOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let promo = sqlx::query_as::<_, PromoCode>(
            "SELECT id, code, credits, max_redemptions, redemption_count, expires_at, \
                    is_active, created_at \
             FROM promo_codes WHERE code = $1 FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(promo) = promo else {
            return Ok(RedemptionOutcome::UnknownCode);
        };

        if Self::lock_balance(&mut *tx, user_id).await?.is_none() {
            return Ok(RedemptionOutcome::UnknownUser);
        }

        if let Err(rejection) = promo.terms().check_redeemable(Utc::now()) {
            return Ok(RedemptionOutcome::Rejected(rejection));
        }

        let inserted = sqlx::query(
            "INSERT INTO promo_redemptions (promo_code_id, user_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_promo_redemptions_code_user DO NOTHING",
        )
        .bind(promo.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(RedemptionOutcome::Rejected(PromoRejection::AlreadyRedeemed));
        }

        sqlx::query("UPDATE promo_codes SET redemption_count = redemption_count + 1 WHERE id = $1")
            .bind(promo.id)
            .execute(&mut *tx)
            .await?;

        let note = format!("Promo code {}", promo.code);
        let change = Self::apply(
            &mut *tx,
            LedgerEntry {
                user_id,
                kind: TransactionKind::PromoRedemption,
                amount: promo.credits,
                job_id: None,
                note: Some(&note),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(RedemptionOutcome::Redeemed(change))
    }

    /// Apply a signed admin adjustment. The balance may not go negative.
    pub async fn adjust(
        pool: &PgPool,
        user_id: DbId,
        amount: i64,
        note: Option<&str>,
    ) -> Result<AdjustOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(balance) = Self::lock_balance(&mut *tx, user_id).await? else {
            return Ok(AdjustOutcome::UnknownUser);
        };
        if let Err(err) = apply_adjustment(balance, amount) {
            return Ok(AdjustOutcome::Rejected(err));
        }

        let change = Self::apply(
            &mut *tx,
            LedgerEntry {
                user_id,
                kind: TransactionKind::AdminAdjustment,
                amount,
                job_id: None,
                note,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(AdjustOutcome::Adjusted(change))
    }

    /// A user's ledger, newest first.
    pub async fn list_transactions(
        pool: &PgPool,
        user_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let (limit, offset) = super::page(limit, offset);
        let query = format!(
            "SELECT {LEDGER_COLUMNS} FROM credit_transactions \
             WHERE user_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Lock the user row and return the current balance.
    pub(crate) async fn lock_balance(
        conn: &mut PgConnection,
        user_id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(conn)
            .await
    }

    /// Add `entry.amount` to the balance and append the ledger row.
    ///
    /// The caller must hold the user row lock and have checked that the
    /// result is non-negative.
    pub(crate) async fn apply(
        conn: &mut PgConnection,
        entry: LedgerEntry<'_>,
    ) -> Result<BalanceChange, sqlx::Error> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET credits = credits + $2 WHERE id = $1 RETURNING credits",
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .fetch_one(&mut *conn)
        .await?;

        let query = format!(
            "INSERT INTO credit_transactions (user_id, kind, amount, balance_after, job_id, note) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {LEDGER_COLUMNS}"
        );
        let transaction = sqlx::query_as::<_, CreditTransaction>(&query)
            .bind(entry.user_id)
            .bind(entry.kind.as_str())
            .bind(entry.amount)
            .bind(balance)
            .bind(entry.job_id)
            .bind(entry.note)
            .fetch_one(&mut *conn)
            .await?;

        Ok(BalanceChange {
            balance,
            transaction,
        })
    }
}
