//! Repository for the `promo_codes` table.

use onlyvalid_core::types::DbId;
use sqlx::PgPool;

use crate::models::promo_code::{CreatePromoCode, PromoCode};

const COLUMNS: &str = "\
    id, code, credits, max_redemptions, redemption_count, expires_at, is_active, created_at";

pub struct PromoCodeRepo;

impl PromoCodeRepo {
    /// Insert a code. `code` must already be normalized; a duplicate
    /// violates `uq_promo_codes_code`.
    pub async fn create(
        pool: &PgPool,
        code: &str,
        input: &CreatePromoCode,
    ) -> Result<PromoCode, sqlx::Error> {
        let query = format!(
            "INSERT INTO promo_codes (code, credits, max_redemptions, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromoCode>(&query)
            .bind(code)
            .bind(input.credits)
            .bind(input.max_redemptions)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<PromoCode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM promo_codes ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, PromoCode>(&query).fetch_all(pool).await
    }

    /// Stop a code from being redeemed. Returns `None` if it does not exist.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<Option<PromoCode>, sqlx::Error> {
        let query = format!(
            "UPDATE promo_codes SET is_active = FALSE WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromoCode>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
