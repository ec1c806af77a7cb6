//! Model pricing and cost estimation
//!
//! Prices are expressed in USD per million tokens. The table is an explicit
//! value handed to [`CostEstimator`], so callers (and tests) can substitute
//! their own prices.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Input and output price of one model, in USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price of one million prompt tokens
    pub input_per_million: f64,
    /// Price of one million completion tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Create a pricing entry
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }
}

/// Mapping from model identifier to its pricing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Create an empty table. Every model estimates to zero cost.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in OpenAI price list
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::pricing::PricingTable;
    ///
    /// let table = PricingTable::builtin();
    /// assert_eq!(table.get("gpt-4.1-mini").unwrap().input_per_million, 0.15);
    /// assert!(table.get("unknown-model").is_none());
    /// ```
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert("gpt-4.1", ModelPricing::new(2.50, 10.00));
        table.insert("gpt-4.1-mini", ModelPricing::new(0.15, 0.60));
        table.insert("gpt-4o", ModelPricing::new(2.50, 10.00));
        table.insert("gpt-4o-mini", ModelPricing::new(0.15, 0.60));
        table.insert("gpt-4-turbo", ModelPricing::new(10.00, 30.00));
        table.insert("gpt-4", ModelPricing::new(30.00, 60.00));
        table.insert("gpt-3.5-turbo", ModelPricing::new(0.50, 1.50));
        table
    }

    /// Add or replace the pricing of one model
    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.entries.insert(model.into(), pricing);
    }

    /// Merge `overrides` over this table, replacing entries with the same model id
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a ModelPricing)>,
    {
        for (model, pricing) in overrides {
            self.entries.insert(model.clone(), *pricing);
        }
        self
    }

    /// Look up the pricing of a model
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.entries.get(model)
    }

    /// Number of priced models
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pure cost computation over an injected [`PricingTable`]
#[derive(Debug, Clone)]
pub struct CostEstimator {
    pricing: PricingTable,
}

impl CostEstimator {
    /// Create an estimator over the given table
    pub fn new(pricing: PricingTable) -> Self {
        Self { pricing }
    }

    /// Estimate the cost of one request in USD
    ///
    /// Unknown models cost `0.0`. That is a policy, not a failure signal.
    ///
    /// # Examples
    ///
    /// ```
    /// use shell_ai::pricing::CostEstimator;
    ///
    /// let estimator = CostEstimator::default();
    /// let cost = estimator.estimate("gpt-4.1-mini", 45, 12);
    /// assert!((cost - (45.0 / 1e6 * 0.15 + 12.0 / 1e6 * 0.60)).abs() < 1e-12);
    /// assert_eq!(estimator.estimate("unknown-model", 45, 12), 0.0);
    /// ```
    pub fn estimate(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let Some(pricing) = self.pricing.get(model) else {
            return 0.0;
        };

        let input_cost = (prompt_tokens as f64 / TOKENS_PER_UNIT) * pricing.input_per_million;
        let output_cost =
            (completion_tokens as f64 / TOKENS_PER_UNIT) * pricing.output_per_million;

        input_cost + output_cost
    }

    /// The table this estimator reads from
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new(PricingTable::builtin())
    }
}
