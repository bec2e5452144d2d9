//! # Bundle Credit
//!
//! Customers who already paid for individual upsells get that spend back
//! as a discount on the bundle, up to a configured cap.

use crate::order::PurchasedItem;
use crate::product::{CreditSettings, Currency};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// What counts toward credit
#[derive(Debug, Clone)]
pub struct CreditPolicy {
    /// Provider price ids whose purchases earn credit
    pub eligible_price_ids: HashSet<String>,
    /// Cap in smallest currency unit
    pub max_credit: i64,
    /// Bundle currency; purchases in other currencies are ignored
    pub currency: Currency,
    /// Ignore purchases before this instant
    pub since: Option<DateTime<Utc>>,
}

impl CreditPolicy {
    /// Build the policy for a bundle priced in `currency`, evaluated at `now`
    pub fn from_settings(
        settings: &CreditSettings,
        eligible_price_ids: HashSet<String>,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            eligible_price_ids,
            max_credit: settings.max_credit,
            currency,
            // a window reaching past chrono's range covers all history
            since: settings
                .lookback_days
                .and_then(|days| Duration::try_days(i64::from(days)))
                .and_then(|window| now.checked_sub_signed(window)),
        }
    }

    fn counts(&self, item: &PurchasedItem) -> bool {
        item.amount_total > 0
            && item.currency == self.currency
            && self.eligible_price_ids.contains(&item.price_id)
            && self.since.map_or(true, |since| item.purchased_at >= since)
    }
}

/// Result of a credit calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditComputation {
    /// Sum of qualifying purchases
    pub eligible_total: i64,
    /// Credit to apply
    pub credit: i64,
    /// True when the cap or the bundle price reduced the credit
    pub capped: bool,
    /// Number of purchases that qualified
    pub counted: usize,
}

impl CreditComputation {
    pub fn none() -> Self {
        Self {
            eligible_total: 0,
            credit: 0,
            capped: false,
            counted: 0,
        }
    }

    pub fn has_credit(&self) -> bool {
        self.credit > 0
    }
}

/// Sum qualifying purchases and cap the result at both the policy maximum
/// and the bundle's own unit amount.
pub fn compute_credit(
    policy: &CreditPolicy,
    purchases: &[PurchasedItem],
    bundle_amount: i64,
) -> CreditComputation {
    let (eligible_total, counted) = purchases
        .iter()
        .filter(|item| policy.counts(item))
        .fold((0i64, 0usize), |(sum, n), item| {
            (sum.saturating_add(item.amount_total), n + 1)
        });

    let ceiling = policy.max_credit.min(bundle_amount).max(0);
    let credit = eligible_total.min(ceiling);

    CreditComputation {
        eligible_total,
        credit,
        capped: credit < eligible_total,
        counted,
    }
}
