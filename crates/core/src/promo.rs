//! Promo code format and redemption eligibility.

use std::fmt;

use rand::Rng;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Shortest accepted promo code.
pub const MIN_CODE_LENGTH: usize = 4;

/// Longest accepted promo code.
pub const MAX_CODE_LENGTH: usize = 32;

/// Length of codes generated when an admin omits one.
pub const GENERATED_CODE_LENGTH: usize = 10;

/// Normalize a user-entered code: trim and upper-case, then check that it
/// only contains `A-Z`, `0-9` and `-`.
pub fn normalize_code(raw: &str) -> Result<String, CoreError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() < MIN_CODE_LENGTH || code.len() > MAX_CODE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Promo code must be {MIN_CODE_LENGTH}-{MAX_CODE_LENGTH} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::Validation(
            "Promo code may only contain letters, digits and '-'".into(),
        ));
    }
    Ok(code)
}

/// Generate a random upper-case alphanumeric code.
pub fn generate_code() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(GENERATED_CODE_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Redemption limits of a promo code, as stored.
#[derive(Debug, Clone, Copy)]
pub struct PromoTerms {
    pub is_active: bool,
    pub expires_at: Option<Timestamp>,
    pub max_redemptions: Option<i32>,
    pub redemption_count: i32,
}

/// Why a code cannot be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoRejection {
    Inactive,
    Expired,
    Exhausted,
    AlreadyRedeemed,
}

impl fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PromoRejection::Inactive => "Promo code is no longer active",
            PromoRejection::Expired => "Promo code has expired",
            PromoRejection::Exhausted => "Promo code has reached its redemption limit",
            PromoRejection::AlreadyRedeemed => "Promo code was already redeemed by this user",
        };
        f.write_str(msg)
    }
}

impl From<PromoRejection> for CoreError {
    fn from(value: PromoRejection) -> Self {
        match value {
            PromoRejection::AlreadyRedeemed => CoreError::Conflict(value.to_string()),
            _ => CoreError::Validation(value.to_string()),
        }
    }
}

impl PromoTerms {
    /// Check whether one more redemption is allowed at `now`.
    ///
    /// Per-user uniqueness is enforced separately by the caller.
    pub fn check_redeemable(&self, now: Timestamp) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }
        if self.expires_at.is_some_and(|expires| expires <= now) {
            return Err(PromoRejection::Expired);
        }
        if self
            .max_redemptions
            .is_some_and(|max| self.redemption_count >= max)
        {
            return Err(PromoRejection::Exhausted);
        }
        Ok(())
    }
}
