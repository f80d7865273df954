use serde::Serialize;

/// A discrete lot of tokens with its own age.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBatch {
    pub amount: f64,
    pub age_days: u64,
    pub acquired_at: u64,
}

impl TokenBatch {
    pub fn new(amount: f64, acquired_at: u64) -> Self {
        Self {
            amount,
            age_days: 0,
            acquired_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Holdings {
    batches: Vec<TokenBatch>,
}

impl Holdings {
    pub fn from_batches(batches: Vec<TokenBatch>) -> Self {
        Self { batches }
    }

    pub fn batches(&self) -> &[TokenBatch] {
        &self.batches
    }

    pub fn add_batch(&mut self, batch: TokenBatch) {
        self.batches.push(batch);
    }

    pub fn total(&self) -> f64 {
        self.batches.iter().map(|batch| batch.amount).sum()
    }

    /// Amount-weighted mean age in days; zero for empty holdings.
    pub fn weighted_age(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        self.batches
            .iter()
            .map(|batch| batch.amount * batch.age_days as f64)
            .sum::<f64>()
            / total
    }

    pub fn oldest_age(&self) -> Option<u64> {
        self.batches.iter().map(|batch| batch.age_days).max()
    }

    /// Batches acquired at `timestep` (or later) are pinned to age zero; every
    /// other batch gets one day older.
    pub(crate) fn age(&mut self, timestep: u64) {
        for batch in &mut self.batches {
            if batch.acquired_at >= timestep {
                batch.age_days = 0;
            } else {
                batch.age_days = batch.age_days.saturating_add(1);
            }
        }
    }
}
