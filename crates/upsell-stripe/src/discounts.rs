//! # Coupons & Promotion Codes
//!
//! Bundle credit is delivered as a fixed-amount coupon wrapped in a
//! promotion code. The coupon only applies to the bundle product, both are
//! single use, and the code is bound to the customer and expires after a
//! day. A customer who opens the bundle checkout again gets their
//! unredeemed code back instead of a fresh one.

use crate::client::{StripeClient, StripeList};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use upsell_core::{AppliedDiscount, CreditGrant, PaymentError, PaymentResult};
use uuid::Uuid;

const COUPON_NAME: &str = "Bundle credit";
const PURPOSE: &str = "bundle_credit";

/// How long a minted promotion code stays redeemable
const CODE_LIFETIME_HOURS: i64 = 24;

/// A code this close to expiring is not handed out again
const REUSE_MIN_REMAINING_HOURS: i64 = 1;

impl StripeClient {
    /// Single-use, customer-bound promotion code for the grant, reusing an
    /// unredeemed one when it still has time left
    #[instrument(skip(self, grant), fields(customer_id = %grant.customer_id, amount_off = grant.amount_off))]
    pub async fn mint_discount(&self, grant: &CreditGrant) -> PaymentResult<AppliedDiscount> {
        if grant.amount_off <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Discount amount must be positive".to_string(),
            ));
        }
        if grant.product_id.is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Discount must be restricted to a product".to_string(),
            ));
        }

        let now = Utc::now();
        if let Some(existing) = self.reusable_discount(grant, now).await? {
            info!(
                "Reusing bundle credit: promotion_code={}, amount_off={}",
                existing.promotion_code_id, existing.amount_off
            );
            return Ok(existing);
        }

        let coupon_form = vec![
            ("amount_off".to_string(), grant.amount_off.to_string()),
            ("currency".to_string(), grant.currency.as_str().to_string()),
            ("duration".to_string(), "once".to_string()),
            ("max_redemptions".to_string(), "1".to_string()),
            ("name".to_string(), COUPON_NAME.to_string()),
            ("applies_to[products][0]".to_string(), grant.product_id.clone()),
            ("metadata[customer_id]".to_string(), grant.customer_id.clone()),
            ("metadata[purpose]".to_string(), PURPOSE.to_string()),
        ];
        let coupon: StripeCoupon = self
            .post_form("/v1/coupons", &coupon_form, &Uuid::new_v4().to_string())
            .await?;

        let expires_at = now + Duration::hours(CODE_LIFETIME_HOURS);
        let promo_form = vec![
            ("coupon".to_string(), coupon.id.clone()),
            ("customer".to_string(), grant.customer_id.clone()),
            ("max_redemptions".to_string(), "1".to_string()),
            ("expires_at".to_string(), expires_at.timestamp().to_string()),
            ("metadata[customer_id]".to_string(), grant.customer_id.clone()),
            ("metadata[purpose]".to_string(), PURPOSE.to_string()),
            ("metadata[product_id]".to_string(), grant.product_id.clone()),
        ];
        let promo: StripePromotionCode = self
            .post_form("/v1/promotion_codes", &promo_form, &Uuid::new_v4().to_string())
            .await?;

        info!(
            "Minted bundle credit: coupon={}, promotion_code={}, amount_off={}",
            coupon.id, promo.id, grant.amount_off
        );

        Ok(AppliedDiscount {
            coupon_id: coupon.id,
            promotion_code_id: promo.id,
            code: promo.code,
            amount_off: grant.amount_off,
            currency: grant.currency,
            expires_at: promo
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .or(Some(expires_at)),
        })
    }

    /// Deactivate a promotion code so it can no longer be redeemed
    #[instrument(skip(self))]
    pub async fn deactivate_promotion_code(&self, promotion_code_id: &str) -> PaymentResult<()> {
        let path = format!("/v1/promotion_codes/{}", promotion_code_id);
        let form = vec![("active".to_string(), "false".to_string())];
        let _: StripePromotionCode = self
            .post_form(&path, &form, &Uuid::new_v4().to_string())
            .await?;

        info!("Deactivated promotion code {}", promotion_code_id);
        Ok(())
    }

    async fn reusable_discount(
        &self,
        grant: &CreditGrant,
        now: DateTime<Utc>,
    ) -> PaymentResult<Option<AppliedDiscount>> {
        let codes: StripeList<StripePromotionCode> = self
            .get(
                "/v1/promotion_codes",
                &[
                    ("customer", grant.customer_id.as_str()),
                    ("active", "true"),
                    ("limit", "100"),
                ],
            )
            .await?;

        let cutoff = now + Duration::hours(REUSE_MIN_REMAINING_HOURS);
        let found = codes
            .data
            .into_iter()
            .find_map(|promo| promo.matching(grant, cutoff));

        debug!("Reusable bundle credit found={}", found.is_some());
        Ok(found)
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCoupon {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePromotionCode {
    id: String,
    code: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    times_redeemed: u64,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    coupon: Option<StripeCouponRef>,
}

#[derive(Debug, Deserialize)]
struct StripeCouponRef {
    id: String,
    #[serde(default)]
    amount_off: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default = "default_valid")]
    valid: bool,
}

fn default_valid() -> bool {
    true
}

impl StripePromotionCode {
    /// The code as a discount for this grant, if it was minted for the
    /// same credit and stays redeemable past `cutoff`
    fn matching(self, grant: &CreditGrant, cutoff: DateTime<Utc>) -> Option<AppliedDiscount> {
        let meta = |key: &str| self.metadata.get(key).map(String::as_str);
        if meta("purpose") != Some(PURPOSE)
            || meta("product_id") != Some(grant.product_id.as_str())
            || self.times_redeemed > 0
        {
            return None;
        }

        let expires_at = DateTime::from_timestamp(self.expires_at?, 0)?;
        if expires_at <= cutoff {
            return None;
        }

        let coupon = self.coupon?;
        if !coupon.valid
            || coupon.amount_off != Some(grant.amount_off)
            || coupon.currency.as_deref() != Some(grant.currency.as_str())
        {
            return None;
        }

        Some(AppliedDiscount {
            coupon_id: coupon.id,
            promotion_code_id: self.id,
            code: self.code,
            amount_off: grant.amount_off,
            currency: grant.currency,
            expires_at: Some(expires_at),
        })
    }
}
