// src/pricing.rs
// Per-token pricing for cost display and the token estimate used when
// a stream reports no usage
//
// Rates are blended (prompt and completion billed alike).

use std::collections::HashMap;
use std::fmt;

/// Literal recorded for models without a known rate
pub const UNAVAILABLE: &str = "unavailable";

/// Flat cost per token for a billable model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub per_token: f64,
}

impl ModelPricing {
    const fn new(per_token: f64) -> Self {
        Self { per_token }
    }

    pub fn calculate_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.per_token
    }
}

/// Built-in rates, looked up by exact model id
fn builtin_pricing(model: &str) -> Option<ModelPricing> {
    match model {
        // $0.002 / 1K tokens
        "gpt-3.5-turbo" => Some(ModelPricing::new(0.000_002)),
        // $0.06 / 1K tokens
        "gpt-4" => Some(ModelPricing::new(0.000_06)),
        _ => None,
    }
}

/// Cost of one exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Dollars(f64),
    Unavailable,
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dollars(amount) => write!(f, "{:.5}", amount),
            Self::Unavailable => write!(f, "{}", UNAVAILABLE),
        }
    }
}

/// Pricing table: built-in rates plus per-model overrides from config
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    overrides: HashMap<String, f64>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, f64>) -> Self {
        Self { overrides }
    }

    pub fn pricing_for(&self, model: &str) -> Option<ModelPricing> {
        self.overrides
            .get(model)
            .map(|rate| ModelPricing::new(*rate))
            .or_else(|| builtin_pricing(model))
    }

    pub fn cost(&self, model: &str, tokens: u64) -> Cost {
        match self.pricing_for(model) {
            Some(pricing) => Cost::Dollars(pricing.calculate_cost(tokens)),
            None => Cost::Unavailable,
        }
    }
}

/// Rough token count for text the service did not meter: one token per
/// four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4)
}
