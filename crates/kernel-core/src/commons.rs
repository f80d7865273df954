//! Hatch and augmented bonding curve.
//!
//! The curve keeps `supply^kappa / reserve` constant, which makes the spot
//! price `kappa * reserve / supply`. The funding pool sits beside the reserve
//! and is only ever drawn down by [`Commons::spend`].

use contracts::HatchConfig;
use serde::Serialize;

use crate::error::{Result, SimulationError};
use crate::holdings::TokenBatch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commons {
    reserve: f64,
    funding_pool: f64,
    token_supply: f64,
    kappa: f64,
    invariant: f64,
}

impl Commons {
    /// Opens the commons from its hatch raise. The hatch tribute seeds the
    /// funding pool and the rest becomes the curve's reserve.
    pub fn hatch(config: &HatchConfig) -> Result<Self> {
        let raise = config.total_hatch_raise;
        if !(raise > 0.0 && config.hatch_price > 0.0 && config.kappa > 0.0) {
            return Err(contracts::ConfigIssue::new(
                "hatch",
                "raise, price and kappa must all be positive",
            )
            .into());
        }
        let token_supply = raise / config.hatch_price;
        let funding_pool = config.hatch_tribute * raise;
        let reserve = raise - funding_pool;
        if reserve <= 0.0 {
            return Err(
                contracts::ConfigIssue::new("hatch.hatch_tribute", "leaves no reserve").into(),
            );
        }
        Ok(Self {
            reserve,
            funding_pool,
            token_supply,
            kappa: config.kappa,
            invariant: token_supply.powf(config.kappa) / reserve,
        })
    }

    pub fn reserve(&self) -> f64 {
        self.reserve
    }

    pub fn funding_pool(&self) -> f64 {
        self.funding_pool
    }

    pub fn token_supply(&self) -> f64 {
        self.token_supply
    }

    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    pub fn invariant(&self) -> f64 {
        self.invariant
    }

    pub fn token_price(&self) -> f64 {
        self.kappa * self.reserve / self.token_supply
    }

    /// `(tokens minted, realized price)` for depositing `amount` into the
    /// reserve, without changing the curve.
    pub fn quote_deposit(&self, amount: f64) -> Result<(f64, f64)> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(SimulationError::InvalidAmount {
                operation: "deposit",
                amount,
            });
        }
        let new_supply = (self.invariant * (self.reserve + amount)).powf(1.0 / self.kappa);
        let minted = new_supply - self.token_supply;
        Ok((minted, amount / minted))
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(f64, f64)> {
        let (minted, price) = self.quote_deposit(amount)?;
        self.reserve += amount;
        self.token_supply += minted;
        Ok((minted, price))
    }

    pub fn spend(&mut self, amount: f64) -> Result<()> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(SimulationError::InvalidAmount {
                operation: "spend",
                amount,
            });
        }
        if amount > self.funding_pool {
            return Err(SimulationError::InsufficientFunds {
                requested: amount,
                available: self.funding_pool,
            });
        }
        self.funding_pool -= amount;
        Ok(())
    }
}

/// One batch per hatcher, bought at the hatch price during timestep 0.
pub fn create_token_batches(contributions: &[f64], hatch_price: f64) -> Vec<TokenBatch> {
    contributions
        .iter()
        .map(|contribution| TokenBatch::new(contribution / hatch_price, 0))
        .collect()
}
