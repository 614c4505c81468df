//! Per-model prices and call cost

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::roster::AgentDescriptor;

/// Price in currency units per 1000 tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Pricing {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// `input / 1000 * input_price + output / 1000 * output_price`
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Built-in prices for the Yandex model families, in rubles
const BUILTIN_PRICES: &[(&str, Pricing)] = &[
    ("yandexgpt-lite", Pricing::new(0.2, 0.2)),
    ("yandexgpt", Pricing::new(1.2, 1.2)),
    ("yandexgpt-32k", Pricing::new(1.2, 1.2)),
    ("llama-lite", Pricing::new(0.2, 0.2)),
    ("llama", Pricing::new(1.2, 1.2)),
];

/// Price lookup keyed by model-type tag
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, Pricing>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriceTable {
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let prices = BUILTIN_PRICES
            .iter()
            .map(|(tag, p)| (tag.to_string(), *p))
            .collect();
        Self { prices }
    }

    pub fn insert(&mut self, model_type: impl Into<String>, pricing: Pricing) {
        self.prices.insert(model_type.into(), pricing);
    }

    /// Roster prices override the table for that agent's model type.
    /// A descriptor with only one side priced keeps the other side from the table.
    pub fn with_roster<'a>(mut self, agents: impl IntoIterator<Item = &'a AgentDescriptor>) -> Self {
        for agent in agents {
            if agent.price_per_1k_input.is_none() && agent.price_per_1k_output.is_none() {
                continue;
            }
            let base = self.get(&agent.model_type).unwrap_or_default();
            self.insert(
                agent.model_type.clone(),
                Pricing::new(
                    agent.price_per_1k_input.unwrap_or(base.input_per_1k),
                    agent.price_per_1k_output.unwrap_or(base.output_per_1k),
                ),
            );
        }
        self
    }

    pub fn get(&self, model_type: &str) -> Option<Pricing> {
        self.prices.get(model_type).copied()
    }

    /// Cost of a call; unknown model types cost nothing
    pub fn cost(&self, model_type: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        match self.get(model_type) {
            Some(pricing) => pricing.cost(input_tokens, output_tokens),
            None => {
                tracing::debug!(model_type, "No price for model type, cost is 0");
                0.0
            }
        }
    }
}
