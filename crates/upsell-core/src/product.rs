//! # Product Types
//!
//! The fixed set of upsell products offered alongside a job posting.
//! The catalog is loaded from `config/products.toml`; amounts are never
//! stored here, they are looked up from the provider by `price_id`.

use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "jpy" => Ok(Currency::JPY),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            "chf" => Ok(Currency::CHF),
            "mxn" => Ok(Currency::MXN),
            other => Err(PaymentError::UnsupportedCurrency {
                currency: other.to_string(),
            }),
        }
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a price from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
            Currency::CHF => "CHF ",
            Currency::MXN => "MX$",
        };
        if self.currency.decimal_places() == 0 {
            format!("{}{}", symbol, self.amount)
        } else {
            format!("{}{:.2}", symbol, self.as_decimal())
        }
    }
}

/// An upsell product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Public identifier used by the job board (e.g., "featured")
    pub id: String,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Provider price identifier (price_...)
    pub price_id: String,

    /// Whether this product is available for purchase
    #[serde(default = "default_true")]
    pub active: bool,

    /// Prior purchases of this product count toward bundle credit
    #[serde(default)]
    pub credit_eligible: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a new product bound to a provider price
    pub fn new(id: impl Into<String>, name: impl Into<String>, price_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price_id: price_id.into(),
            active: true,
            credit_eligible: false,
        }
    }

    /// Builder: mark purchases of this product as credit eligible
    pub fn credit_eligible(mut self) -> Self {
        self.credit_eligible = true;
        self
    }

    /// Builder: mark inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Longest purchase history window the credit can look back over
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Bundle credit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditSettings {
    /// Product id of the bundle the credit applies to
    pub bundle: String,

    /// Upper bound on credit, in the bundle currency's smallest unit
    pub max_credit: i64,

    /// Only purchases within this many days count (all history when unset)
    #[serde(default)]
    pub lookback_days: Option<u32>,
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(default)]
    pub credit: Option<CreditSettings>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
            credit: None,
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.add(product);
        self
    }

    /// Builder: set credit settings
    pub fn with_credit(mut self, credit: CreditSettings) -> Self {
        self.credit = Some(credit);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Find a product that can be sold right now
    pub fn get_active(&self, id: &str) -> PaymentResult<&Product> {
        let product = self.get(id).ok_or_else(|| PaymentError::ProductNotFound {
            product_id: id.to_string(),
        })?;

        if !product.active {
            return Err(PaymentError::InvalidRequest(format!(
                "Product is not available: {}",
                id
            )));
        }

        Ok(product)
    }

    /// Get all active products
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Reverse lookup by provider price id
    pub fn by_price_id(&self, price_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.price_id == price_id)
    }

    /// Price ids whose prior purchases earn credit
    pub fn eligible_price_ids(&self) -> HashSet<String> {
        self.products
            .iter()
            .filter(|p| p.credit_eligible)
            .map(|p| p.price_id.clone())
            .collect()
    }

    /// The bundle product and its credit settings, if configured
    pub fn bundle(&self) -> PaymentResult<(&Product, &CreditSettings)> {
        let settings = self.credit.as_ref().ok_or_else(|| {
            PaymentError::Configuration("No bundle credit configured".to_string())
        })?;
        let product = self.get_active(&settings.bundle).map_err(|_| {
            PaymentError::Configuration(format!(
                "Bundle product is missing or inactive: {}",
                settings.bundle
            ))
        })?;
        Ok((product, settings))
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> PaymentResult<Self> {
        let catalog: Self = toml::from_str(toml_str)
            .map_err(|e| PaymentError::Configuration(format!("Invalid catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check catalog consistency
    pub fn validate(&self) -> PaymentResult<()> {
        let mut seen = HashSet::new();
        for product in &self.products {
            if product.id.trim().is_empty() {
                return Err(PaymentError::Configuration(
                    "Product with empty id".to_string(),
                ));
            }
            if product.price_id.trim().is_empty() {
                return Err(PaymentError::Configuration(format!(
                    "Product {} has no price_id",
                    product.id
                )));
            }
            if !seen.insert(product.id.as_str()) {
                return Err(PaymentError::Configuration(format!(
                    "Duplicate product id: {}",
                    product.id
                )));
            }
        }

        if let Some(credit) = &self.credit {
            let bundle = self.get(&credit.bundle).ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "Credit bundle refers to unknown product: {}",
                    credit.bundle
                ))
            })?;
            if bundle.credit_eligible {
                return Err(PaymentError::Configuration(format!(
                    "Bundle product {} cannot itself be credit eligible",
                    bundle.id
                )));
            }
            if credit.lookback_days.map_or(false, |d| d > MAX_LOOKBACK_DAYS) {
                return Err(PaymentError::Configuration(format!(
                    "lookback_days must be at most {}",
                    MAX_LOOKBACK_DAYS
                )));
            }
            if credit.max_credit < 0 {
                return Err(PaymentError::Configuration(
                    "max_credit must not be negative".to_string(),
                ));
            }
        }

        Ok(())
    }
}
