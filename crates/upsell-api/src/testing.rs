//! In-memory `PaymentProvider` and fixtures for handler tests.

use crate::config::AppConfig;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use upsell_core::{
    AppliedDiscount, CheckoutOrder, CheckoutSession, CreditGrant, CreditSettings, Currency, PaymentError,
    PaymentProvider, PaymentResult, PriceQuote, Product, ProductCatalog, PurchasedItem,
};

pub fn test_config() -> AppConfig {
    AppConfig::from_vars(|key| match key {
        "SUCCESS_URL" => Some("https://jobs.test/upsell/done".to_string()),
        "CANCEL_URL" => Some("https://jobs.test/upsell/cancel".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub fn catalog() -> ProductCatalog {
    ProductCatalog::new()
        .with_product(Product::new("featured", "Featured Listing", "price_featured").credit_eligible())
        .with_product(Product::new("urgent", "Urgent Badge", "price_urgent").credit_eligible())
        .with_product(Product::new("alerts", "Candidate Alerts", "price_alerts"))
        .with_product(Product::new("bundle", "Visibility Bundle", "price_bundle"))
        .with_product(Product::new("legacy", "Old Boost", "price_legacy").inactive())
        .with_credit(CreditSettings {
            bundle: "bundle".to_string(),
            max_credit: 5000,
            lookback_days: Some(90),
        })
}

pub struct MockProvider {
    prices: HashMap<String, PriceQuote>,
    customers: HashMap<String, String>,
    purchases: HashMap<String, Vec<PurchasedItem>>,
    failing_prices: HashSet<String>,
    failing_checkout: bool,
    price_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    discount_calls: AtomicUsize,
    orders: Mutex<Vec<CheckoutOrder>>,
    issued: Mutex<Vec<Issued>>,
}

/// A discount handed out, with the grant it was minted for
struct Issued {
    grant: CreditGrant,
    discount: AppliedDiscount,
    active: bool,
}

fn quote(price_id: &str, amount: i64, recurring: Option<&str>) -> PriceQuote {
    PriceQuote {
        price_id: price_id.to_string(),
        unit_amount: amount,
        currency: Currency::USD,
        recurring: recurring.map(String::from),
        product_id: price_id.strip_prefix("price_").map(|name| format!("prod_{}", name)),
        product_name: None,
        active: true,
    }
}

impl MockProvider {
    pub fn new() -> Self {
        let prices = [
            quote("price_featured", 4900, None),
            quote("price_urgent", 1900, None),
            quote("price_alerts", 900, Some("month")),
            quote("price_bundle", 7900, None),
            quote("price_legacy", 500, None),
        ]
        .into_iter()
        .map(|q| (q.price_id.clone(), q))
        .collect();

        Self {
            prices,
            customers: HashMap::new(),
            purchases: HashMap::new(),
            failing_prices: HashSet::new(),
            failing_checkout: false,
            price_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            discount_calls: AtomicUsize::new(0),
            orders: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn with_inactive_price(mut self, price_id: &str) -> Self {
        if let Some(q) = self.prices.get_mut(price_id) {
            q.active = false;
        }
        self
    }

    pub fn with_failing_price(mut self, price_id: &str) -> Self {
        self.failing_prices.insert(price_id.to_string());
        self
    }

    /// Every checkout session creation fails
    pub fn with_failing_checkout(mut self) -> Self {
        self.failing_checkout = true;
        self
    }

    pub fn with_customer(mut self, email: &str, customer_id: &str) -> Self {
        self.customers.insert(email.to_string(), customer_id.to_string());
        self
    }

    /// Record a paid purchase `days_ago`
    pub fn with_purchase(mut self, customer_id: &str, price_id: &str, amount: i64, days_ago: i64) -> Self {
        let items = self.purchases.entry(customer_id.to_string()).or_default();
        items.push(PurchasedItem {
            session_id: format!("cs_hist_{}", items.len()),
            price_id: price_id.to_string(),
            amount_total: amount,
            currency: Currency::USD,
            purchased_at: Utc::now() - Duration::days(days_ago),
        });
        self
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Discounts minted, not counting reuses
    pub fn discount_calls(&self) -> usize {
        self.discount_calls.load(Ordering::SeqCst)
    }

    pub fn last_grant(&self) -> Option<CreditGrant> {
        self.issued
            .lock()
            .ok()
            .and_then(|i| i.last().map(|d| d.grant.clone()))
    }

    /// Promotion code ids that were revoked
    pub fn revoked(&self) -> Vec<String> {
        self.issued
            .lock()
            .map(|issued| {
                issued
                    .iter()
                    .filter(|d| !d.active)
                    .map(|d| d.discount.promotion_code_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last_order(&self) -> Option<CheckoutOrder> {
        self.orders.lock().ok().and_then(|o| o.last().cloned())
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn fetch_price(&self, price_id: &str) -> PaymentResult<PriceQuote> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_prices.contains(price_id) {
            return Err(PaymentError::NetworkError("connection reset".to_string()));
        }
        self.prices
            .get(price_id)
            .cloned()
            .ok_or_else(|| PaymentError::ProductNotFound {
                product_id: price_id.to_string(),
            })
    }

    async fn create_checkout(&self, order: &CheckoutOrder) -> PaymentResult<CheckoutSession> {
        if self.failing_checkout {
            return Err(PaymentError::ProviderError {
                provider: "mock".to_string(),
                message: "session rejected".to_string(),
            });
        }
        let mut orders = self
            .orders
            .lock()
            .map_err(|_| PaymentError::Internal("poisoned".to_string()))?;
        orders.push(order.clone());
        let id = format!("cs_test_{}", orders.len());

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{}", id),
            session_id: id,
            expires_at: None,
            customer_id: order.customer_id.clone(),
        })
    }

    async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<String>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.customers.get(email).cloned())
    }

    async fn list_purchases(&self, customer_id: &str) -> PaymentResult<Vec<PurchasedItem>> {
        Ok(self.purchases.get(customer_id).cloned().unwrap_or_default())
    }

    async fn create_one_time_discount(&self, grant: &CreditGrant) -> PaymentResult<AppliedDiscount> {
        let mut issued = self
            .issued
            .lock()
            .map_err(|_| PaymentError::Internal("poisoned".to_string()))?;
        if let Some(existing) = issued.iter().find(|d| d.active && d.grant == *grant) {
            return Ok(existing.discount.clone());
        }

        let n = self.discount_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let discount = AppliedDiscount {
            coupon_id: format!("coup_{}", n),
            promotion_code_id: format!("promo_{}", n),
            code: format!("CREDIT-{}-{}", grant.customer_id.to_uppercase(), n),
            amount_off: grant.amount_off,
            currency: grant.currency,
            expires_at: Some(Utc::now() + Duration::hours(24)),
        };
        issued.push(Issued {
            grant: grant.clone(),
            discount: discount.clone(),
            active: true,
        });
        Ok(discount)
    }

    async fn revoke_discount(&self, discount: &AppliedDiscount) -> PaymentResult<()> {
        let mut issued = self
            .issued
            .lock()
            .map_err(|_| PaymentError::Internal("poisoned".to_string()))?;
        for d in issued
            .iter_mut()
            .filter(|d| d.discount.promotion_code_id == discount.promotion_code_id)
        {
            d.active = false;
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn is_test_mode(&self) -> bool {
        true
    }
}
