//! Promo codes that grant credits.

use onlyvalid_core::promo::PromoTerms;
use onlyvalid_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `promo_codes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromoCode {
    pub id: DbId,
    pub code: String,
    pub credits: i64,
    pub max_redemptions: Option<i32>,
    pub redemption_count: i32,
    pub expires_at: Option<Timestamp>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl PromoCode {
    pub fn terms(&self) -> PromoTerms {
        PromoTerms {
            is_active: self.is_active,
            expires_at: self.expires_at,
            max_redemptions: self.max_redemptions,
            redemption_count: self.redemption_count,
        }
    }
}

/// DTO for `POST /api/v1/admin/promo-codes`.
///
/// A random code is generated when `code` is omitted.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromoCode {
    pub code: Option<String>,
    #[validate(range(min = 1))]
    pub credits: i64,
    #[validate(range(min = 1))]
    pub max_redemptions: Option<i32>,
    pub expires_at: Option<Timestamp>,
}
